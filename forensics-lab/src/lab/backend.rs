//! Backend seam for the lab

use crate::tools::{
    EvidenceFile, ForensicTool, JobDescriptor, ToolClient, ToolError, ToolInvocationResult,
};

/// Operations the lab needs from a forensics backend.
pub trait ForensicsBackend: Send + Sync {
    fn upload_evidence(&self, file: &EvidenceFile) -> Result<JobDescriptor, ToolError>;

    fn run(&self, tool: ForensicTool, job_id: &str) -> Result<ToolInvocationResult, ToolError>;
}

impl ForensicsBackend for ToolClient {
    fn upload_evidence(&self, file: &EvidenceFile) -> Result<JobDescriptor, ToolError> {
        ToolClient::upload_evidence(self, file)
    }

    fn run(&self, tool: ForensicTool, job_id: &str) -> Result<ToolInvocationResult, ToolError> {
        ToolClient::run(self, tool, job_id)
    }
}
