//! Blocking HTTP client for the forensics backend

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::Read;
use std::time::Duration;

use super::encoding::{urlencoded, MultipartBody};
use super::error::ToolError;
use super::result::{BackendHealth, EvidenceFile, JobDescriptor, ToolInvocationResult};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Forensic tools the backend can run against an uploaded job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForensicTool {
    /// Sleuth Kit `fls -r` over a disk image
    FileSystemListing,
    /// Volatility `pslist` over a memory image
    ProcessList,
}

impl ForensicTool {
    /// Short command name, as the backend calls it.
    pub fn command(&self) -> &'static str {
        match self {
            ForensicTool::FileSystemListing => "fls",
            ForensicTool::ProcessList => "pslist",
        }
    }

    fn suite(&self) -> &'static str {
        match self {
            ForensicTool::FileSystemListing => "tsk",
            ForensicTool::ProcessList => "volatility",
        }
    }

    /// Request path for `job_id`, with the id percent-encoded.
    pub fn path(&self, job_id: &str) -> String {
        format!(
            "/tools/{}/{}/{}",
            self.suite(),
            urlencoded(job_id),
            self.command()
        )
    }
}

impl std::fmt::Display for ForensicTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Client for the forge runner HTTP API.
#[derive(Clone)]
pub struct ToolClient {
    host: String,
    api_key: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for ToolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolClient")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ToolClient {
    /// Create a client for `host` (e.g. `http://localhost:5000`).
    pub fn new(host: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build();

        Self {
            host,
            api_key: api_key.into(),
            agent,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}?api_key={}", self.host, path, urlencoded(&self.api_key))
    }

    pub fn upload_url(&self) -> String {
        self.endpoint("/tools/upload")
    }

    pub fn tool_url(&self, tool: ForensicTool, job_id: &str) -> String {
        self.endpoint(&tool.path(job_id))
    }

    /// Upload an evidence file as multipart field `file`.
    ///
    /// The file contents are streamed into the request body.
    pub fn upload_evidence(&self, file: &EvidenceFile) -> Result<JobDescriptor, ToolError> {
        let body = MultipartBody::single_file("file", &file.filename);
        let (contents, len) = file
            .open()
            .map_err(|e| ToolError::EvidenceUnreadable(format!("{}: {}", file.filename, e)))?;
        tracing::debug!("Uploading {} ({} bytes) to {}", file.filename, len, self.host);

        let response = self
            .agent
            .post(&self.upload_url())
            .set("Content-Type", &body.content_type())
            .set("Content-Length", &body.content_length(len).to_string())
            .send(body.reader(contents));

        let value = read_json(response)?;
        decode(value)
    }

    /// Run `fls` against an uploaded disk image.
    pub fn run_file_system_listing(&self, job_id: &str) -> Result<ToolInvocationResult, ToolError> {
        self.run(ForensicTool::FileSystemListing, job_id)
    }

    /// Run Volatility `pslist` against an uploaded memory image.
    pub fn run_process_list(&self, job_id: &str) -> Result<ToolInvocationResult, ToolError> {
        self.run(ForensicTool::ProcessList, job_id)
    }

    /// Run `tool` against `job_id`.
    pub fn run(&self, tool: ForensicTool, job_id: &str) -> Result<ToolInvocationResult, ToolError> {
        tracing::debug!("Running {} for job {}", tool, job_id);
        let response = self.agent.post(&self.tool_url(tool, job_id)).send_bytes(&[]);
        read_json(response).map(ToolInvocationResult::new)
    }

    /// Query the backend's health endpoint (no API key required).
    pub fn health(&self) -> Result<BackendHealth, ToolError> {
        let url = format!("{}/health", self.host);
        let value = read_json(self.agent.get(&url).call())?;
        decode(value)
    }
}

/// Shared response handling: classify failures, parse 2xx bodies as JSON.
fn read_json(response: Result<ureq::Response, ureq::Error>) -> Result<Value, ToolError> {
    let response = match response {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            let body = read_body(response).unwrap_or_default();
            return Err(ToolError::RequestFailed {
                status: code,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Err(ureq::Error::Transport(transport)) => return Err(transport.into()),
    };

    let status = response.status();
    let body = read_body(response)
        .map_err(|e| ToolError::NetworkUnavailable(format!("Failed to read response: {}", e)))?;

    if !(200..300).contains(&status) {
        return Err(ToolError::RequestFailed {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    serde_json::from_slice(&body).map_err(|e| ToolError::MalformedResponse(e.to_string()))
}

fn read_body(response: ureq::Response) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();
    response.into_reader().read_to_end(&mut body)?;
    Ok(body)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ToolError> {
    serde_json::from_value(value).map_err(|e| ToolError::MalformedResponse(e.to_string()))
}
