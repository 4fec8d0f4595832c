//! Job orchestration
//!
//! Binds user actions (upload evidence, run a tool against a job) to backend
//! calls and job store updates. One lab instance exposes a single loading
//! flag, a single last-output slot and a single alert slot.
//!
//! Actions are serialized: a second action waits until the one in flight has
//! finished. The observable state stays readable while an action runs.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::audit::{ActivityKind, ActivityLog};
use crate::jobs::{Job, JobStore};
use crate::tools::{EvidenceFile, ForensicTool, ToolError, ToolInvocationResult};

pub mod backend;
pub mod state;

pub use backend::ForensicsBackend;
pub use state::{LabAction, LabSnapshot, LabStatus};

use state::LabState;

/// Why a lab action did not complete
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The backend accepted the evidence but the job could not be saved.
    #[error("Uploaded as job {job_id} but could not save it locally: {cause:#}")]
    NotSaved { job_id: String, cause: anyhow::Error },

    #[error("Lab has been shut down")]
    ShutDown,
}

pub struct ForensicsLab {
    backend: Arc<dyn ForensicsBackend>,
    jobs: Arc<JobStore>,
    activity: Option<Arc<ActivityLog>>,
    /// Held for the whole duration of an action
    action_gate: Mutex<()>,
    state: Mutex<LabState>,
    closed: AtomicBool,
}

impl ForensicsLab {
    pub fn new(backend: Arc<dyn ForensicsBackend>, jobs: Arc<JobStore>) -> Self {
        Self {
            backend,
            jobs,
            activity: None,
            action_gate: Mutex::new(()),
            state: Mutex::new(LabState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Record every action in `log`.
    pub fn with_activity_log(mut self, log: Arc<ActivityLog>) -> Self {
        self.activity = Some(log);
        self
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// Upload an evidence file and track the resulting job.
    ///
    /// On failure the alert slot is set to `Upload failed: <reason>`. If the
    /// backend took the file but the job could not be saved, the alert names
    /// the new job instead.
    pub fn upload(&self, file: &EvidenceFile) -> Result<Job, LabError> {
        let _gate = self.begin()?;
        {
            let mut state = self.state();
            state.current = Some(LabAction::Upload {
                filename: file.filename.clone(),
            });
            state.alert = None;
        }

        let uploaded = self.backend.upload_evidence(file);

        if self.is_shut_down() {
            tracing::debug!("Discarding upload result after shutdown");
            self.state().leave();
            return Err(LabError::ShutDown);
        }

        let result = uploaded.map_err(LabError::from).and_then(|descriptor| {
            let job = Job::from_upload(&descriptor, Utc::now());
            match self.jobs.add(job.clone()) {
                Ok(true) => {}
                Ok(false) => tracing::warn!("Backend returned already tracked job {}", job.job_id),
                Err(cause) => {
                    return Err(LabError::NotSaved {
                        job_id: job.job_id,
                        cause,
                    })
                }
            }
            Ok(job)
        });

        let (kind, entry) = {
            let mut state = self.state();
            state.leave();
            match &result {
                Ok(job) => {
                    tracing::info!("Uploaded {} as job {}", job.filename, job.job_id);
                    (
                        ActivityKind::Upload,
                        format!("{} -> job {}", job.filename, job.job_id),
                    )
                }
                Err(e) => {
                    tracing::warn!("Upload of {} failed: {}", file.filename, e);
                    state.alert = Some(match e {
                        LabError::NotSaved { .. } => e.to_string(),
                        _ => format!("Upload failed: {}", e),
                    });
                    (ActivityKind::Failure, format!("upload {}: {}", file.filename, e))
                }
            }
        };
        self.record(kind, entry);

        result
    }

    /// Run `tool` against `job_id` and show its output.
    ///
    /// The last-output slot is cleared when the run starts, then holds either
    /// the result's display text or `Error: <reason>`.
    pub fn run(&self, tool: ForensicTool, job_id: &str) -> Result<ToolInvocationResult, LabError> {
        let _gate = self.begin()?;
        {
            let mut state = self.state();
            state.current = Some(LabAction::Run {
                tool,
                job_id: job_id.to_string(),
            });
            state.last_output = None;
        }

        if self.jobs.get(job_id).is_none() {
            tracing::debug!("Running {} for untracked job {}", tool, job_id);
        }

        let result = self.backend.run(tool, job_id);

        if self.is_shut_down() {
            tracing::debug!("Discarding {} result after shutdown", tool);
            self.state().leave();
            return Err(LabError::ShutDown);
        }

        let (kind, entry) = {
            let mut state = self.state();
            state.leave();
            match &result {
                Ok(output) => {
                    state.last_output = Some(output.display_text());
                    tracing::info!("{} finished for job {}", tool, job_id);
                    let rc = output
                        .exit_code()
                        .map(|rc| format!(" (rc {})", rc))
                        .unwrap_or_default();
                    (ActivityKind::ToolRun, format!("{} job {}{}", tool, job_id, rc))
                }
                Err(e) => {
                    state.last_output = Some(format!("Error: {}", e));
                    tracing::warn!("{} failed for job {}: {}", tool, job_id, e);
                    (ActivityKind::Failure, format!("{} job {}: {}", tool, job_id, e))
                }
            }
        };
        // Written after the state lock is released so readers never wait on disk
        self.record(kind, entry);

        result.map_err(LabError::from)
    }

    pub fn run_file_system_listing(&self, job_id: &str) -> Result<ToolInvocationResult, LabError> {
        self.run(ForensicTool::FileSystemListing, job_id)
    }

    pub fn run_process_list(&self, job_id: &str) -> Result<ToolInvocationResult, LabError> {
        self.run(ForensicTool::ProcessList, job_id)
    }

    pub fn snapshot(&self) -> LabSnapshot {
        self.state().snapshot()
    }

    pub fn status(&self) -> LabStatus {
        self.state().status()
    }

    pub fn is_loading(&self) -> bool {
        self.state().current.is_some()
    }

    pub fn last_output(&self) -> Option<String> {
        self.state().last_output.clone()
    }

    pub fn alert(&self) -> Option<String> {
        self.state().alert.clone()
    }

    pub fn dismiss_alert(&self) {
        self.state().alert = None;
    }

    /// Stop accepting actions. Results of an action still in flight are
    /// dropped instead of being written to the lab state or the job store.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<MutexGuard<'_, ()>, LabError> {
        if self.is_shut_down() {
            return Err(LabError::ShutDown);
        }
        let gate = self
            .action_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Shutdown may have happened while waiting for the gate
        if self.is_shut_down() {
            return Err(LabError::ShutDown);
        }
        Ok(gate)
    }

    fn state(&self) -> MutexGuard<'_, LabState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, kind: ActivityKind, message: String) {
        if let Some(log) = &self.activity {
            if let Err(e) = log.record(kind, &message) {
                tracing::warn!("Failed to write activity log: {:#}", e);
            }
        }
    }
}
