//! Durable, ordered job collection

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::Job;
use crate::storage::KeyValueStore;

/// Storage key holding the JSON array of jobs
pub const JOBS_KEY: &str = "forensic_jobs_v1";

/// Persisted job data could not be parsed.
///
/// Recovered inside `JobStore::load`; it never reaches callers of the store.
#[derive(Debug, thiserror::Error)]
#[error("Persisted job list is malformed: {0}")]
pub struct MalformedPersistedState(#[from] serde_json::Error);

/// Jobs created by the user, most recent first, deduplicated by `job_id`.
///
/// Every successful `add` is written through to the persistence port before
/// the in-memory list changes.
pub struct JobStore {
    port: Arc<dyn KeyValueStore>,
    jobs: Mutex<Vec<Job>>,
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore").field("jobs", &self.all()).finish()
    }
}

impl JobStore {
    /// Load the persisted collection.
    ///
    /// Absent, empty or malformed data yields an empty store; read failures
    /// from the port are treated the same way.
    pub fn load(port: Arc<dyn KeyValueStore>) -> Self {
        let jobs = match port.get(JOBS_KEY) {
            Ok(Some(raw)) => match decode_jobs(&raw) {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::warn!("Ignoring persisted jobs: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read persisted jobs: {:#}", e);
                Vec::new()
            }
        };

        tracing::debug!("Loaded {} job(s)", jobs.len());
        Self {
            port,
            jobs: Mutex::new(jobs),
        }
    }

    /// Prepend `job` and persist the full list.
    ///
    /// Returns `Ok(false)` without writing if a job with the same id is
    /// already known. On a write failure the store is left unchanged.
    pub fn add(&self, job: Job) -> Result<bool> {
        let mut jobs = self.lock();

        if jobs.iter().any(|existing| existing.job_id == job.job_id) {
            tracing::warn!("Job {} already tracked; not adding again", job.job_id);
            return Ok(false);
        }

        let mut updated = Vec::with_capacity(jobs.len() + 1);
        updated.push(job);
        updated.extend(jobs.iter().cloned());

        self.persist(&updated)?;
        *jobs = updated;
        Ok(true)
    }

    /// Snapshot of all jobs, most recent first.
    pub fn all(&self) -> Vec<Job> {
        self.lock().clone()
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.lock().iter().find(|job| job.job_id == job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget all jobs (persisted as an empty list).
    pub fn clear(&self) -> Result<()> {
        let mut jobs = self.lock();
        self.persist(&[])?;
        jobs.clear();
        Ok(())
    }

    fn persist(&self, jobs: &[Job]) -> Result<()> {
        let raw = serde_json::to_string(jobs).context("Failed to serialize jobs")?;
        self.port
            .set(JOBS_KEY, &raw)
            .context("Failed to persist jobs")
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Job>> {
        // The list is only ever replaced wholesale
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parse persisted jobs, dropping repeated ids (first occurrence wins).
fn decode_jobs(raw: &str) -> Result<Vec<Job>, MalformedPersistedState> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: Option<Vec<Job>> = serde_json::from_str(raw)?;

    let mut seen = HashSet::new();
    Ok(parsed
        .unwrap_or_default()
        .into_iter()
        .filter(|job| seen.insert(job.job_id.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileKeyValueStore, MemoryKeyValueStore};
    use anyhow::bail;

    fn memory_port(value: Option<&str>) -> Arc<dyn KeyValueStore> {
        let store = MemoryKeyValueStore::new();
        let store = match value {
            Some(v) => store.with_value(JOBS_KEY, v),
            None => store,
        };
        Arc::new(store)
    }

    #[test]
    fn test_load_absent_is_empty() {
        let store = JobStore::load(memory_port(None));
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_empty_and_malformed_is_empty() {
        for raw in ["", "   ", "not json", "{\"job_id\":1}", "[{\"filename\":\"x\"}]", "null"] {
            let store = JobStore::load(memory_port(Some(raw)));
            assert!(store.all().is_empty(), "raw value {:?}", raw);
        }
    }

    #[test]
    fn test_add_prepends_and_persists() {
        let port = memory_port(None);
        let store = JobStore::load(port.clone());

        assert!(store.add(Job::new("J1", "disk.img").with_created_at(1)).unwrap());
        assert!(store.add(Job::new("J2", "mem.raw").with_created_at(2)).unwrap());

        let ids: Vec<_> = store.all().into_iter().map(|j| j.job_id).collect();
        assert_eq!(ids, vec!["J2", "J1"]);

        let persisted = port.get(JOBS_KEY).unwrap().unwrap();
        let decoded: Vec<Job> = serde_json::from_str(&persisted).unwrap();
        assert_eq!(decoded, store.all());
    }

    #[test]
    fn test_add_duplicate_is_rejected() {
        let store = JobStore::load(memory_port(None));
        assert!(store.add(Job::new("J1", "a.img")).unwrap());
        assert!(!store.add(Job::new("J1", "b.img")).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("J1").unwrap().filename, "a.img");
    }

    #[test]
    fn test_roundtrip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            Job::new("J3", "c.img").with_created_at(1_700_000_000_003),
            Job::new("J2", "b.img"),
            Job::new("J1", "a.img").with_created_at(1_700_000_000_001),
        ];

        {
            let port: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::open(dir.path()).unwrap());
            let store = JobStore::load(port);
            for job in jobs.iter().rev() {
                store.add(job.clone()).unwrap();
            }
        }

        let port: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::open(dir.path()).unwrap());
        let reloaded = JobStore::load(port);
        assert_eq!(reloaded.all(), jobs);
    }

    #[test]
    fn test_load_drops_duplicate_ids() {
        let raw = r#"[{"job_id":"J2","filename":"new.img"},{"job_id":"J1","filename":"a.img"},{"job_id":"J2","filename":"old.img"}]"#;
        let store = JobStore::load(memory_port(Some(raw)));
        let all = store.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].filename, "new.img");
    }

    #[test]
    fn test_clear() {
        let port = memory_port(None);
        let store = JobStore::load(port.clone());
        store.add(Job::new("J1", "a.img")).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(port.get(JOBS_KEY).unwrap().as_deref(), Some("[]"));
    }

    struct FailingPort;

    impl KeyValueStore for FailingPort {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            bail!("disk full")
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let store = JobStore::load(Arc::new(FailingPort));
        assert!(store.add(Job::new("J1", "a.img")).is_err());
        assert!(store.is_empty());
    }

    struct UnreadablePort;

    impl KeyValueStore for UnreadablePort {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            bail!("permission denied")
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unreadable_port_loads_empty() {
        let store = JobStore::load(Arc::new(UnreadablePort));
        assert!(store.is_empty());
    }
}
