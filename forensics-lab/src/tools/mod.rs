//! Forensics backend client
//!
//! Evidence upload and tool invocation (`fls`, `pslist`) against the forge
//! runner HTTP API.

pub mod client;
pub mod encoding;
pub mod error;
pub mod result;

pub use client::{ForensicTool, ToolClient, DEFAULT_TIMEOUT};
pub use error::ToolError;
pub use result::{BackendHealth, EvidenceFile, JobDescriptor, ToolInvocationResult};
