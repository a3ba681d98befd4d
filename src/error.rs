//! Centralized error types for the `bz` command.
//!
//! Library calls return [`ApiError`]; the command wraps everything in
//! [`AppError`] to print a short message and, where one exists, a hint.

use thiserror::Error;

use crate::api::{ApiError, FaultKind};
use crate::config::ConfigError;

/// The main application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// API-related errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// IO errors (file system, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with a message.
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        AppError::Other(msg.into())
    }

    /// Get a user-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => config_message(e),
            AppError::Api(e) => match e {
                ApiError::Usage(msg) => msg.clone(),
                ApiError::Transport(_) => {
                    "Connection failed. Please check your network and the server URL.".to_string()
                }
                ApiError::Fault(fault) => match fault.kind {
                    FaultKind::NotFound => match fault.bug_id {
                        Some(id) => format!("Bug {} does not exist.", id),
                        None => fault.message.clone(),
                    },
                    FaultKind::NotAuthorized => match fault.bug_id {
                        Some(id) => format!("You are not authorized to see bug {}.", id),
                        None => fault.message.clone(),
                    },
                    FaultKind::TokenExpired => "Your login token has expired.".to_string(),
                    FaultKind::Other => format!("Bugzilla error {}: {}", fault.code, fault.message),
                },
                ApiError::Http { status, .. } => {
                    format!("The server answered with HTTP {}.", status)
                }
                ApiError::InvalidResponse(_) => {
                    "Unexpected response from Bugzilla. Is the URL an XML-RPC endpoint?"
                        .to_string()
                }
                ApiError::InvalidUrl(url) => format!("Invalid Bugzilla URL: {}", url),
                ApiError::Config(e) => config_message(e),
            },
            AppError::Io(_) => "A file operation failed. Please check file permissions.".to_string(),
            AppError::Other(msg) => msg.clone(),
        }
    }

    /// Get a suggested action for the user.
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            AppError::Api(ApiError::Fault(fault)) => match fault.kind {
                FaultKind::NotAuthorized => {
                    Some("Pass --api-key, or add an api_key to ~/.config/python-bugzilla/bugzillarc.")
                }
                FaultKind::TokenExpired => {
                    Some("Log in again with --username, or switch to an API key.")
                }
                _ => None,
            },
            AppError::Api(ApiError::Transport(_)) => {
                Some("Check your connection, or raise --timeout for slow servers.")
            }
            AppError::Api(ApiError::InvalidResponse(_)) | AppError::Api(ApiError::Http { .. }) => {
                Some("Check that --url ends in xmlrpc.cgi.")
            }
            _ => None,
        }
    }
}

fn config_message(e: &ConfigError) -> String {
    match e {
        ConfigError::NoConfigDir => {
            "Could not find your home or configuration directory.".to_string()
        }
        ConfigError::ReadError { path, .. } => format!("Could not read {}.", path),
        ConfigError::ParseError { path, message } => format!("{} is invalid: {}", path, message),
        ConfigError::InvalidUrl(url) => format!("'{}' is not a valid server URL.", url),
    }
}

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, AppError>;
