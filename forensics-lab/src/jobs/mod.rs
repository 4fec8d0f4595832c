//! Evidence jobs
//!
//! A job is the backend-assigned tracking record for one uploaded evidence
//! file. Jobs are created once and never mutated.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::JobDescriptor;

pub mod store;

pub use store::{JobStore, MalformedPersistedState, JOBS_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub filename: String,
    /// Client-side creation time, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            filename: filename.into(),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, millis: i64) -> Self {
        self.created_at = Some(millis);
        self
    }

    /// Build the job record for a completed upload, stamped with `now`.
    pub fn from_upload(descriptor: &JobDescriptor, now: DateTime<Utc>) -> Self {
        Self {
            job_id: descriptor.job_id.clone(),
            filename: descriptor.filename.clone(),
            created_at: Some(now.timestamp_millis()),
        }
    }

    /// Creation time as a UTC timestamp, if recorded and in range.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_upload_stamps_time() {
        let descriptor: JobDescriptor =
            serde_json::from_value(json!({"job_id": "J1", "filename": "evidence.img"})).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let job = Job::from_upload(&descriptor, now);
        assert_eq!(job.job_id, "J1");
        assert_eq!(job.filename, "evidence.img");
        assert_eq!(job.created_at, Some(now.timestamp_millis()));
        assert_eq!(job.created(), Some(now));
    }

    #[test]
    fn test_serialize_omits_missing_created_at() {
        let json = serde_json::to_string(&Job::new("J1", "a.img")).unwrap();
        assert_eq!(json, r#"{"job_id":"J1","filename":"a.img"}"#);
    }

    #[test]
    fn test_deserialize_without_created_at() {
        let job: Job = serde_json::from_str(r#"{"job_id":"J1","filename":"a.img"}"#).unwrap();
        assert_eq!(job.created_at, None);
        assert_eq!(job.created(), None);
    }
}
