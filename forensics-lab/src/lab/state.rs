//! Observable lab state

use crate::tools::ForensicTool;

/// Action currently in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabAction {
    Upload { filename: String },
    Run { tool: ForensicTool, job_id: String },
}

impl std::fmt::Display for LabAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabAction::Upload { filename } => write!(f, "uploading {}", filename),
            LabAction::Run { tool, job_id } => write!(f, "running {} for job {}", tool, job_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabStatus {
    Idle,
    Busy(LabAction),
}

/// Point-in-time copy of the lab's display state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabSnapshot {
    pub loading: bool,
    pub current: Option<LabAction>,
    pub last_output: Option<String>,
    pub alert: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct LabState {
    pub(crate) current: Option<LabAction>,
    pub(crate) last_output: Option<String>,
    pub(crate) alert: Option<String>,
}

impl LabState {
    pub(crate) fn leave(&mut self) {
        self.current = None;
    }

    pub(crate) fn status(&self) -> LabStatus {
        match &self.current {
            Some(action) => LabStatus::Busy(action.clone()),
            None => LabStatus::Idle,
        }
    }

    pub(crate) fn snapshot(&self) -> LabSnapshot {
        LabSnapshot {
            loading: self.current.is_some(),
            current: self.current.clone(),
            last_output: self.last_output.clone(),
            alert: self.alert.clone(),
        }
    }
}
