//! Tool client errors

/// Failure of a request to the forensics backend.
///
/// Transport failures are always classified; callers never see raw
/// `ureq` errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// The request could not be sent or completed (DNS, refused, timeout).
    #[error("Backend unavailable: {0}")]
    NetworkUnavailable(String),

    /// The backend answered 2xx but the body was not the expected JSON.
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// The evidence file could not be read for upload.
    #[error("Failed to read evidence file {0}")]
    EvidenceUnreadable(String),
}

impl ToolError {
    /// HTTP status for `RequestFailed`, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ToolError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the API key.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<ureq::Transport> for ToolError {
    fn from(err: ureq::Transport) -> Self {
        ToolError::NetworkUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failed_message() {
        let err = ToolError::RequestFailed {
            status: 500,
            body: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: disk full");
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_unauthorized() {
        let err = ToolError::RequestFailed {
            status: 401,
            body: "{\"detail\":\"Invalid API key\"}".to_string(),
        };
        assert!(err.is_unauthorized());
        assert_eq!(ToolError::NetworkUnavailable("x".into()).status(), None);
    }
}
