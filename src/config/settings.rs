//! Settings for the `bz` command.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ConfigError, Result};
use crate::api::{AuthMode, DEFAULT_URL};

/// Settings file name inside the configuration directory.
const SETTINGS_FILE: &str = "config.toml";

/// Command-line settings, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The XML-RPC endpoint to talk to.
    pub url: String,
    /// Where API keys are sent.
    pub auth_mode: AuthMode,
    /// Request timeout in seconds. No timeout when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            auth_mode: AuthMode::Auto,
            timeout_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from the platform configuration directory.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is unknown or the file is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load settings from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// The default settings path, e.g. `~/.config/bugzilla-rpc/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join("bugzilla-rpc").join(SETTINGS_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.url, DEFAULT_URL);
        assert_eq!(settings.auth_mode, AuthMode::Auto);
        assert_eq!(settings.timeout_secs, None);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "url = \"https://bugzilla.example.com/xmlrpc.cgi\"\nauth_mode = \"both\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.url, "https://bugzilla.example.com/xmlrpc.cgi");
        assert_eq!(settings.auth_mode, AuthMode::Both);
        assert_eq!(settings.timeout_secs, None);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "auth_mode = \"carrier-pigeon\"\n").unwrap();

        let result = Settings::load_from(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_default_path_structure() {
        let path = Settings::default_path().unwrap();
        assert!(path.ends_with("bugzilla-rpc/config.toml"));
    }
}
