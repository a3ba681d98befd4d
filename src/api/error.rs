//! API error types for the Bugzilla client.
//!
//! Faults returned by the server are classified by their fault code into a
//! [`FaultKind`]; transport failures are kept as-is.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::xmlrpc::CodecError;
use crate::config::ConfigError;

/// Fault code for a bug that does not exist.
pub const FAULT_NOT_FOUND: i64 = 101;

/// Fault code for a bug the caller may not see.
pub const FAULT_NOT_AUTHORIZED: i64 = 102;

/// Fault code for an expired login token.
pub const FAULT_TOKEN_EXPIRED: i64 = 32000;

/// Matches "Bug #1234" / "bug 1234" in fault messages.
static BUG_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbug\s*#?\s*(\d+)").expect("bug ID pattern is a valid regex")
});

/// Classification of a server fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Fault 101: the bug does not exist.
    NotFound,
    /// Fault 102: the bug exists but is not visible to this user.
    NotAuthorized,
    /// Fault 32000: the login token has expired.
    TokenExpired,
    /// Any other fault code.
    Other,
}

impl FaultKind {
    /// Classify a fault code.
    pub fn from_code(code: i64) -> Self {
        match code {
            FAULT_NOT_FOUND => FaultKind::NotFound,
            FAULT_NOT_AUTHORIZED => FaultKind::NotAuthorized,
            FAULT_TOKEN_EXPIRED => FaultKind::TokenExpired,
            _ => FaultKind::Other,
        }
    }
}

/// A fault raised by the Bugzilla server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// The classified fault.
    pub kind: FaultKind,
    /// The raw fault code.
    pub code: i64,
    /// The server's fault string.
    pub message: String,
    /// The bug the fault refers to, for not-found and not-authorized faults.
    pub bug_id: Option<u64>,
}

impl Fault {
    /// Build a fault from the server's code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = FaultKind::from_code(code);
        let bug_id = match kind {
            FaultKind::NotFound | FaultKind::NotAuthorized => extract_bug_id(&message),
            _ => None,
        };
        Self {
            kind,
            code,
            message,
            bug_id,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FaultKind::NotFound => write!(f, "Bug not found: {}", self.message),
            FaultKind::NotAuthorized => write!(f, "Not authorized: {}", self.message),
            FaultKind::TokenExpired => write!(f, "Login token expired: {}", self.message),
            FaultKind::Other => write!(f, "Bugzilla fault {}: {}", self.code, self.message),
        }
    }
}

fn extract_bug_id(message: &str) -> Option<u64> {
    BUG_ID_PATTERN
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Errors that can occur when talking to Bugzilla.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The call was made with invalid arguments.
    #[error("Usage error: {0}")]
    Usage(String),

    /// Network or HTTP transport failure (including timeouts).
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an XML-RPC fault.
    #[error("{0}")]
    Fault(Fault),

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response could not be understood.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Invalid server URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Credential files could not be read.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create an error from an XML-RPC fault.
    pub fn from_fault(code: i64, message: impl Into<String>) -> Self {
        ApiError::Fault(Fault::new(code, message))
    }

    /// Create an error for a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Http {
            status: status.as_u16(),
            body: body.trim().to_string(),
        }
    }

    /// The fault kind, if this error is a server fault.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            ApiError::Fault(fault) => Some(fault.kind),
            _ => None,
        }
    }

    /// Whether retrying the same call might succeed.
    ///
    /// Only transport failures qualify. This crate never retries by itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        ApiError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_fault_101_is_not_found() {
        let err = ApiError::from_fault(101, "Bug #1422893 does not exist.");
        match err {
            ApiError::Fault(fault) => {
                assert_eq!(fault.kind, FaultKind::NotFound);
                assert_eq!(fault.code, 101);
                assert_eq!(fault.message, "Bug #1422893 does not exist.");
                assert_eq!(fault.bug_id, Some(1422893));
            }
            _ => panic!("Expected Fault error"),
        }
    }

    #[test]
    fn test_fault_102_is_not_authorized() {
        let err = ApiError::from_fault(102, "You are not authorized to access bug #1000.");
        assert_eq!(err.fault_kind(), Some(FaultKind::NotAuthorized));
        match err {
            ApiError::Fault(fault) => assert_eq!(fault.bug_id, Some(1000)),
            _ => panic!("Expected Fault error"),
        }
    }

    #[test]
    fn test_fault_32000_is_token_expired() {
        let err = ApiError::from_fault(32000, "The token you specified has expired.");
        assert_eq!(err.fault_kind(), Some(FaultKind::TokenExpired));
    }

    #[test]
    fn test_unknown_fault_is_other() {
        let err = ApiError::from_fault(51, "Invalid user bob.");
        assert_eq!(err.fault_kind(), Some(FaultKind::Other));
        assert_eq!(err.to_string(), "Bugzilla fault 51: Invalid user bob.");
    }

    #[test]
    fn test_bug_id_missing_from_message() {
        let fault = Fault::new(101, "Bug alias 'foo' does not exist.");
        assert_eq!(fault.kind, FaultKind::NotFound);
        assert_eq!(fault.bug_id, None);
    }

    #[test]
    fn test_bug_id_only_extracted_for_bug_faults() {
        let fault = Fault::new(32000, "Bug 12 token expired");
        assert_eq!(fault.bug_id, None);
    }

    #[test]
    fn test_from_status() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down\n");
        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            _ => panic!("Expected Http error"),
        }
    }

    #[test]
    fn test_only_transport_is_transient() {
        assert!(!ApiError::from_fault(101, "gone").is_transient());
        assert!(!ApiError::InvalidResponse("bad".to_string()).is_transient());
        assert!(!ApiError::Usage("bad".to_string()).is_transient());
    }

    #[test]
    fn test_codec_error_is_invalid_response() {
        let err: ApiError = CodecError::Malformed("empty <methodResponse>".to_string()).into();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::from_fault(101, "Bug #5 does not exist.");
        assert_eq!(err.to_string(), "Bug not found: Bug #5 does not exist.");

        let err = ApiError::Usage("specify a password for bob".to_string());
        assert_eq!(err.to_string(), "Usage error: specify a password for bob");
    }
}
