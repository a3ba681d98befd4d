//! Configuration for bugzilla-rpc.
//!
//! Two independent layers live here: the INI credential files shared with
//! other Bugzilla tools, and the `bz` command's own TOML settings.

mod credentials;
mod settings;

use thiserror::Error;

pub use credentials::{domain_of, CredentialStore};
pub use settings::Settings;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform configuration directory could not be determined.
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// A configuration file exists but could not be read.
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    /// A configuration file could not be parsed.
    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    /// A server URL has no usable domain.
    #[error("Invalid server URL '{0}'")]
    InvalidUrl(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
