//! Backend response payloads

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Upload response: the backend-assigned identity of an evidence file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub filename: String,
    /// Any additional fields the backend returned
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Unstructured result of a tool run.
///
/// The forge runner answers with `{stdout, stderr, rc}`, but any JSON payload
/// is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationResult {
    payload: Value,
}

impl ToolInvocationResult {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    pub fn stdout(&self) -> Option<&str> {
        self.payload.get("stdout").and_then(Value::as_str)
    }

    pub fn stderr(&self) -> Option<&str> {
        self.payload.get("stderr").and_then(Value::as_str)
    }

    /// Tool exit code (`rc`), when reported.
    pub fn exit_code(&self) -> Option<i64> {
        self.payload.get("rc").and_then(Value::as_i64)
    }

    /// Text to show for this result.
    ///
    /// Non-empty stdout wins, then non-empty stderr, then the whole payload
    /// pretty-printed.
    pub fn display_text(&self) -> String {
        if let Some(stdout) = self.stdout().filter(|s| !s.is_empty()) {
            return stdout.to_string();
        }
        if let Some(stderr) = self.stderr().filter(|s| !s.is_empty()) {
            return stderr.to_string();
        }
        serde_json::to_string_pretty(&self.payload).unwrap_or_else(|_| self.payload.to_string())
    }
}

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    /// Backend clock, seconds since the epoch
    #[serde(default)]
    pub time: Option<f64>,
}

impl BackendHealth {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// An evidence file ready for upload.
///
/// Files opened with `from_path` are streamed from disk at upload time and
/// never held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceFile {
    pub filename: String,
    source: EvidenceSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EvidenceSource {
    Memory(Vec<u8>),
    Disk { path: PathBuf, len: u64 },
}

impl EvidenceFile {
    pub fn new(filename: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            source: EvidenceSource::Memory(contents),
        }
    }

    /// Refer to an evidence file on disk, keeping only its file name for the
    /// upload.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .ok_or_else(|| anyhow::anyhow!("Evidence path has no file name: {:?}", path))?;
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read evidence file: {:?}", path))?;
        if !metadata.is_file() {
            bail!("Evidence path is not a file: {:?}", path);
        }

        Ok(Self {
            filename,
            source: EvidenceSource::Disk {
                path: path.to_path_buf(),
                len: metadata.len(),
            },
        })
    }

    /// Size in bytes.
    pub fn len(&self) -> u64 {
        match &self.source {
            EvidenceSource::Memory(bytes) => bytes.len() as u64,
            EvidenceSource::Disk { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open the contents for reading, along with their current length.
    pub fn open(&self) -> io::Result<(Box<dyn Read + '_>, u64)> {
        match &self.source {
            EvidenceSource::Memory(bytes) => {
                Ok((Box::new(bytes.as_slice()), bytes.len() as u64))
            }
            EvidenceSource::Disk { path, .. } => {
                let file = File::open(path)?;
                let len = file.metadata()?.len();
                Ok((Box::new(BufReader::new(file)), len))
            }
        }
    }
}
