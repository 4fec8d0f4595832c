//! Tamper-evident activity log
//!
//! Every lab action (evidence upload, tool run, sign-in) is appended as one
//! line, chained to the previous line by a SHA-256 hash:
//!
//! ```text
//! timestamp|current_hash|prev_hash|[KIND] message
//! ```
//!
//! `current_hash` is the first 16 hex chars of
//! `SHA256(prev_hash || timestamp || message)`. Editing, dropping or
//! reordering lines breaks the chain.

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Previous-hash value of the first entry
const GENESIS_HASH: &str = "0000000000000000";

/// Category of a logged action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Upload,
    ToolRun,
    Failure,
    Session,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityKind::Upload => write!(f, "UPLOAD"),
            ActivityKind::ToolRun => write!(f, "TOOL"),
            ActivityKind::Failure => write!(f, "FAILURE"),
            ActivityKind::Session => write!(f, "SESSION"),
        }
    }
}

pub(crate) struct Chain {
    file: File,
    last_hash: String,
}

/// Append-only, hash-chained activity log
pub struct ActivityLog {
    path: PathBuf,
    chain: Mutex<Chain>,
}

impl ActivityLog {
    /// Open the log at `path`, continuing its chain if it already exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {:?}", parent))?;
        }

        let existing = path.exists();
        let last_hash = if existing {
            read_last_hash(&path)?
        } else {
            GENESIS_HASH.to_string()
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open activity log: {:?}", path))?;

        if !existing {
            writeln!(file, "# forensics-lab activity log")?;
            writeln!(file, "# Format: timestamp|current_hash|prev_hash|message")?;
            writeln!(file, "#")?;
            file.sync_all()?;
        }

        Ok(Self {
            path,
            chain: Mutex::new(Chain { file, last_hash }),
        })
    }

    /// Append one entry.
    pub fn record(&self, kind: ActivityKind, message: impl AsRef<str>) -> Result<()> {
        // Entries are line-oriented
        let message = format!("[{}] {}", kind, message.as_ref())
            .replace('\r', "\\r")
            .replace('\n', "\\n");
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        let mut chain = self
            .chain
            .lock()
            .map_err(|_| anyhow::anyhow!("Activity log lock poisoned"))?;

        let current_hash = chain_hash(&chain.last_hash, &timestamp, &message);
        let entry = format!(
            "{}|{}|{}|{}\n",
            timestamp, current_hash, chain.last_hash, message
        );

        chain.file.write_all(entry.as_bytes())?;
        chain.file.sync_all()?;
        chain.last_hash = current_hash;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block writers until the guard is dropped.
    #[cfg(test)]
    pub(crate) fn hold(&self) -> std::sync::MutexGuard<'_, Chain> {
        self.chain.lock().unwrap()
    }

    /// Hash of the latest entry (the genesis hash for an empty log).
    pub fn head_hash(&self) -> String {
        self.chain
            .lock()
            .map(|chain| chain.last_hash.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().last_hash.clone())
    }

    pub fn verify(&self) -> Result<bool> {
        Self::verify_log_file(&self.path)
    }

    /// Check the hash chain of any activity log file.
    ///
    /// Returns `Ok(false)` for malformed lines or a broken chain.
    pub fn verify_log_file(path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let mut expected_prev = GENESIS_HASH.to_string();

        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.starts_with('#') || line.is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.splitn(4, '|').collect();
            let [timestamp, current, prev, message] = parts[..] else {
                return Ok(false);
            };

            if prev != expected_prev || chain_hash(prev, timestamp, message) != current {
                return Ok(false);
            }
            expected_prev = current.to_string();
        }

        Ok(true)
    }
}

fn chain_hash(prev_hash: &str, timestamp: &str, message: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(timestamp.as_bytes());
    hasher.update(message.as_bytes());
    let full = hex::encode(hasher.finalize());
    full[..16].to_string()
}

fn read_last_hash(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut last_hash = GENESIS_HASH.to_string();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        if let Some(hash) = line.split('|').nth(1) {
            last_hash = hash.to_string();
        }
    }

    Ok(last_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_records_are_chained() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("activity.log");

        let log = ActivityLog::open(&path).unwrap();
        assert_eq!(log.head_hash(), GENESIS_HASH);
        log.record(ActivityKind::Upload, "J1 evidence.img").unwrap();
        log.record(ActivityKind::ToolRun, "fls J1").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[UPLOAD] J1 evidence.img"));
        assert!(content.contains("[TOOL] fls J1"));
        assert_ne!(log.head_hash(), GENESIS_HASH);
        assert!(log.verify().unwrap());
    }

    #[test]
    fn test_detects_tampering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("activity.log");
        {
            let log = ActivityLog::open(&path).unwrap();
            log.record(ActivityKind::Upload, "J1 evidence.img").unwrap();
            log.record(ActivityKind::Upload, "J2 memory.raw").unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("evidence.img", "innocent.img")).unwrap();

        assert!(!ActivityLog::verify_log_file(&path).unwrap());
    }

    #[test]
    fn test_continues_existing_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("activity.log");
        {
            let log = ActivityLog::open(&path).unwrap();
            log.record(ActivityKind::Session, "signed in").unwrap();
        }
        let log = ActivityLog::open(&path).unwrap();
        log.record(ActivityKind::Failure, "pslist J9: HTTP 404").unwrap();

        assert!(ActivityLog::verify_log_file(&path).unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("# forensics-lab activity log").count(), 1);
    }

    #[test]
    fn test_multiline_message_stays_on_one_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("activity.log");
        let log = ActivityLog::open(&path).unwrap();
        log.record(ActivityKind::Failure, "HTTP 500: line1\nline2").unwrap();

        assert!(log.verify().unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("line1\\nline2"));
    }
}
