//! Stored credentials.
//!
//! Credentials are kept in INI files with one section per server domain:
//!
//! ```ini
//! [bugzilla.example.com]
//! api_key = abc-123
//! ```
//!
//! API key files carry `api_key`, token files carry `token`. The store never
//! writes; keys and tokens are issued out of band.

use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::debug;
use url::Url;

use super::{ConfigError, Result};
use crate::api::Credential;

/// Field holding an API key.
const API_KEY_FIELD: &str = "api_key";

/// Field holding a legacy login token.
const TOKEN_FIELD: &str = "token";

/// Read-only lookup of stored credentials by server domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    /// Files searched for `api_key`, in order.
    api_key_files: Vec<PathBuf>,
    /// Files searched for `token`, in order.
    token_files: Vec<PathBuf>,
}

impl CredentialStore {
    /// Create an empty store. Every lookup finds nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store using the standard file locations under `home`.
    ///
    /// - API key: `<home>/.config/python-bugzilla/bugzillarc`
    /// - Tokens: `<home>/.cache/python-bugzilla/bugzillatoken`, then the
    ///   legacy `<home>/.bugzillatoken`
    pub fn from_home(home: &Path) -> Self {
        Self::new()
            .with_api_key_file(home.join(".config").join("python-bugzilla").join("bugzillarc"))
            .with_token_file(home.join(".cache").join("python-bugzilla").join("bugzillatoken"))
            .with_token_file(home.join(".bugzillatoken"))
    }

    /// Create a store for the current user's home directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoConfigDir` if the home directory is unknown.
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::from_home(&home))
    }

    /// Add a file to search for API keys.
    pub fn with_api_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.api_key_files.push(path.into());
        self
    }

    /// Add a file to search for tokens.
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_files.push(path.into());
        self
    }

    /// Find the stored API key for a server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL has no domain, or if a file exists but
    /// cannot be read or parsed. A missing file, section or field is not an
    /// error.
    pub fn api_key_for(&self, url: &str) -> Result<Option<String>> {
        let domain = domain_of(url)?;
        find_field(&self.api_key_files, &domain, API_KEY_FIELD)
    }

    /// Find the stored login token for a server URL.
    ///
    /// # Errors
    ///
    /// Same conditions as [`CredentialStore::api_key_for`].
    pub fn token_for(&self, url: &str) -> Result<Option<String>> {
        let domain = domain_of(url)?;
        find_field(&self.token_files, &domain, TOKEN_FIELD)
    }

    /// Find any stored credential for a server URL. API keys win over tokens.
    pub fn lookup(&self, url: &str) -> Result<Option<Credential>> {
        if let Some(key) = self.api_key_for(url)? {
            return Ok(Some(Credential::ApiKey(key)));
        }
        Ok(self.token_for(url)?.map(Credential::Token))
    }
}

/// The domain used to key credentials: the URL's host, plus the port when
/// one is given explicitly.
pub fn domain_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;

    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn find_field(files: &[PathBuf], domain: &str, field: &str) -> Result<Option<String>> {
    for path in files {
        if let Some(value) = read_field(path, domain, field)? {
            debug!(path = %path.display(), domain, field, "Found stored credential");
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn read_field(path: &Path, section: &str, field: &str) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let conf = Ini::load_from_file(path).map_err(|e| match e {
        ini::Error::Io(err) => ConfigError::ReadError {
            path: path.display().to_string(),
            message: err.to_string(),
        },
        other => ConfigError::ParseError {
            path: path.display().to_string(),
            message: other.to_string(),
        },
    })?;

    Ok(conf
        .section(Some(section))
        .and_then(|props| props.get(field))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const URL: &str = "https://bugzilla.example.com/xmlrpc.cgi";

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of(URL).unwrap(), "bugzilla.example.com");
        assert_eq!(
            domain_of("http://localhost:8080/xmlrpc.cgi").unwrap(),
            "localhost:8080"
        );
    }

    #[test]
    fn test_domain_of_rejects_garbage() {
        assert!(matches!(
            domain_of("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_api_key_from_file() {
        let home = tempdir().unwrap();
        write(
            &home.path().join(".config/python-bugzilla/bugzillarc"),
            "[bugzilla.example.com]\napi_key = abc-123-bugzillarc\n",
        );

        let store = CredentialStore::from_home(home.path());
        assert_eq!(
            store.api_key_for(URL).unwrap(),
            Some("abc-123-bugzillarc".to_string())
        );
    }

    #[test]
    fn test_token_from_legacy_file() {
        let home = tempdir().unwrap();
        write(
            &home.path().join(".bugzillatoken"),
            "[bugzilla.example.com]\ntoken = abc-123-legacy\n",
        );

        let store = CredentialStore::from_home(home.path());
        assert_eq!(
            store.token_for(URL).unwrap(),
            Some("abc-123-legacy".to_string())
        );
    }

    #[test]
    fn test_token_cache_file_wins_over_legacy() {
        let home = tempdir().unwrap();
        write(
            &home.path().join(".cache/python-bugzilla/bugzillatoken"),
            "[bugzilla.example.com]\ntoken = abc-123-cache\n",
        );
        write(
            &home.path().join(".bugzillatoken"),
            "[bugzilla.example.com]\ntoken = abc-123-legacy\n",
        );

        let store = CredentialStore::from_home(home.path());
        assert_eq!(
            store.token_for(URL).unwrap(),
            Some("abc-123-cache".to_string())
        );
    }

    #[test]
    fn test_missing_file_is_none() {
        let home = tempdir().unwrap();
        let store = CredentialStore::from_home(home.path());
        assert_eq!(store.lookup(URL).unwrap(), None);
    }

    #[test]
    fn test_missing_section_is_none() {
        let home = tempdir().unwrap();
        write(
            &home.path().join(".config/python-bugzilla/bugzillarc"),
            "[bugzilla.other.org]\napi_key = not-for-us\n",
        );

        let store = CredentialStore::from_home(home.path());
        assert_eq!(store.api_key_for(URL).unwrap(), None);
    }

    #[test]
    fn test_missing_field_is_none() {
        let home = tempdir().unwrap();
        write(
            &home.path().join(".config/python-bugzilla/bugzillarc"),
            "[bugzilla.example.com]\nuser = someone\n",
        );

        let store = CredentialStore::from_home(home.path());
        assert_eq!(store.api_key_for(URL).unwrap(), None);
    }

    #[test]
    fn test_lookup_prefers_api_key() {
        let home = tempdir().unwrap();
        write(
            &home.path().join(".config/python-bugzilla/bugzillarc"),
            "[bugzilla.example.com]\napi_key = the-key\n",
        );
        write(
            &home.path().join(".bugzillatoken"),
            "[bugzilla.example.com]\ntoken = the-token\n",
        );

        let store = CredentialStore::from_home(home.path());
        assert_eq!(
            store.lookup(URL).unwrap(),
            Some(Credential::ApiKey("the-key".to_string()))
        );
    }

    #[test]
    fn test_lookup_falls_back_to_token() {
        let home = tempdir().unwrap();
        write(
            &home.path().join(".bugzillatoken"),
            "[bugzilla.example.com]\ntoken = the-token\n",
        );

        let store = CredentialStore::from_home(home.path());
        assert_eq!(
            store.lookup(URL).unwrap(),
            Some(Credential::Token("the-token".to_string()))
        );
    }

    #[test]
    fn test_empty_store_finds_nothing() {
        assert_eq!(CredentialStore::new().lookup(URL).unwrap(), None);
    }

    #[test]
    fn test_explicit_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.ini");
        write(&path, "[bugzilla.example.com]\napi_key = explicit\n");

        let store = CredentialStore::new().with_api_key_file(&path);
        assert_eq!(store.api_key_for(URL).unwrap(), Some("explicit".to_string()));
    }
}
