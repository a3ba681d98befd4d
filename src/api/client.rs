//! Bugzilla connection.
//!
//! [`connect`] resolves a credential and produces a [`Connection`]; the
//! connection exposes the bug operations as async methods. Every operation
//! is exactly one XML-RPC call with no retries.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::auth::{authenticate_payload, bearer_key, AuthMode, Credential};
use super::error::{ApiError, Result};
use super::transport::{HttpTransport, Transport};
use super::types::{assignee_changed, parse_bugs, Bug};
use super::xmlrpc::{Struct, Value};
use crate::config::CredentialStore;

/// The vendor-run instance, used when no URL is given.
pub const DEFAULT_URL: &str = "https://bugzilla.redhat.com/xmlrpc.cgi";

/// Fields returned by [`Connection::get_bugs_summaries`].
const SUMMARY_FIELDS: [&str; 2] = ["id", "summary"];

/// Fields returned by [`Connection::find_by_external_tracker`].
const SEARCH_FIELDS: [&str; 3] = ["id", "summary", "status"];

/// Options for [`connect`].
#[derive(Clone, Default)]
pub struct ConnectOptions {
    url: Option<String>,
    credential: Option<Credential>,
    username: Option<String>,
    password: Option<String>,
    store: Option<CredentialStore>,
    auth_mode: AuthMode,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
}

impl ConnectOptions {
    /// Options for the default server, anonymous unless configured otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to this XML-RPC endpoint instead of [`DEFAULT_URL`].
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Use this credential. Takes precedence over the credential store.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Shorthand for `credential(Credential::ApiKey(key))`.
    pub fn api_key(self, key: impl Into<String>) -> Self {
        self.credential(Credential::ApiKey(key.into()))
    }

    /// Log in with `User.login` to obtain a session token.
    pub fn login(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Look up stored credentials here when none is given explicitly.
    pub fn credential_store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Choose where API keys are placed.
    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.auth_mode = mode;
        self
    }

    /// Set a per-request timeout on the HTTP transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send all calls, including the login, through this transport.
    ///
    /// The transport is then responsible for any header credentials.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    fn endpoint(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_URL)
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("url", &self.endpoint())
            .field("credential", &self.credential)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("store", &self.store)
            .field("auth_mode", &self.auth_mode)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Connect to a Bugzilla server.
///
/// The credential is resolved in this order:
/// 1. username and password: a `User.login` call yields a session token
/// 2. an explicit credential
/// 3. the credential store, if one is attached
/// 4. anonymous
///
/// # Errors
///
/// Returns `ApiError::Usage` before any network traffic if a username is
/// given without a password. Login failures surface as the call's error.
#[instrument(skip(options), fields(url = %options.endpoint()))]
pub async fn connect(options: ConnectOptions) -> Result<Connection> {
    let url = options.endpoint().to_string();
    let mode = options.auth_mode.resolve(&url);

    let credential = match (&options.username, &options.password) {
        (Some(username), None) => {
            return Err(ApiError::Usage(format!(
                "specify a password for {}",
                username
            )));
        }
        (Some(username), Some(password)) => {
            let transport: Arc<dyn Transport> = match &options.transport {
                Some(transport) => Arc::clone(transport),
                None => Arc::new(HttpTransport::new(&url, None, options.timeout)?),
            };
            Some(login(transport.as_ref(), username, password).await?)
        }
        (None, _) => match options.credential {
            Some(credential) => Some(credential),
            None => match &options.store {
                Some(store) => store.lookup(&url)?,
                None => None,
            },
        },
    };

    let transport: Arc<dyn Transport> = match options.transport {
        Some(transport) => transport,
        None => Arc::new(HttpTransport::new(
            &url,
            bearer_key(credential.as_ref(), mode),
            options.timeout,
        )?),
    };

    info!(
        authenticated = credential.is_some(),
        ?mode,
        "Bugzilla connection ready"
    );
    Ok(Connection {
        url,
        credential,
        auth_mode: mode,
        transport,
    })
}

/// Exchange a username and password for a session token.
async fn login(transport: &dyn Transport, username: &str, password: &str) -> Result<Credential> {
    debug!(username, "Logging in");

    let mut payload = Struct::new();
    payload.insert("login".to_string(), Value::from(username));
    payload.insert("password".to_string(), Value::from(password));

    let result = transport
        .call("User.login", vec![Value::Struct(payload)])
        .await?;

    match result.get("token") {
        Some(Value::String(token)) => Ok(Credential::Token(token.clone())),
        _ => Err(ApiError::InvalidResponse(
            "User.login result has no token".to_string(),
        )),
    }
}

/// A session against one Bugzilla server.
///
/// Immutable once built. Cloning is cheap; clones share the transport, and
/// any number of calls may run concurrently.
#[derive(Debug, Clone)]
pub struct Connection {
    /// The XML-RPC endpoint.
    url: String,
    /// Credential for every call, if any.
    credential: Option<Credential>,
    /// Resolved API key placement.
    auth_mode: AuthMode,
    /// Where calls are sent.
    transport: Arc<dyn Transport>,
}

impl Connection {
    /// Create a connection over an HTTP transport without any network traffic.
    ///
    /// Use [`connect`] to log in or read stored credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: &str, credential: Option<Credential>, auth_mode: AuthMode) -> Result<Self> {
        let mode = auth_mode.resolve(url);
        let transport = HttpTransport::new(url, bearer_key(credential.as_ref(), mode), None)?;
        Ok(Self::with_transport(url, credential, mode, Arc::new(transport)))
    }

    /// Create a connection over any transport.
    pub fn with_transport(
        url: &str,
        credential: Option<Credential>,
        auth_mode: AuthMode,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            url: url.to_string(),
            auth_mode: auth_mode.resolve(url),
            credential,
            transport,
        }
    }

    /// The XML-RPC endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The credential in use, if any.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// The resolved API key placement.
    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    /// Make a raw XML-RPC call with a single struct parameter.
    ///
    /// The payload credential field is added when the auth mode calls for it.
    #[instrument(skip(self, payload))]
    pub async fn call(&self, method: &str, mut payload: Struct) -> Result<Value> {
        authenticate_payload(&mut payload, self.credential.as_ref(), self.auth_mode);

        self.transport
            .call(method, vec![Value::Struct(payload)])
            .await
            .map_err(|e| {
                warn!("{} failed: {}", method, e);
                e
            })
    }

    /// Get a single bug.
    #[instrument(skip(self))]
    pub async fn get_bug(&self, id: u64) -> Result<Bug> {
        let mut payload = Struct::new();
        payload.insert("ids".to_string(), Value::from(vec![id]));

        let result = self.call("Bug.get", payload).await?;
        parse_bugs(result, &self.url)?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse(format!("no record returned for bug {}", id)))
    }

    /// Get several bugs.
    #[instrument(skip(self))]
    pub async fn get_bugs(&self, ids: &[u64]) -> Result<Vec<Bug>> {
        let mut payload = Struct::new();
        payload.insert("ids".to_string(), Value::from(ids.to_vec()));

        let result = self.call("Bug.get", payload).await?;
        let bugs = parse_bugs(result, &self.url)?;
        debug!("Fetched {} bugs", bugs.len());
        Ok(bugs)
    }

    /// Get only the `id` and `summary` of several bugs.
    #[instrument(skip(self))]
    pub async fn get_bugs_summaries(&self, ids: &[u64]) -> Result<Vec<Bug>> {
        let mut payload = Struct::new();
        payload.insert("ids".to_string(), Value::from(ids.to_vec()));
        payload.insert(
            "include_fields".to_string(),
            Value::from(SUMMARY_FIELDS.to_vec()),
        );

        let result = self.call("Bug.get", payload).await?;
        parse_bugs(result, &self.url)
    }

    /// Assign bugs to a user.
    ///
    /// Returns `true` if the first bug's assignee changed, `false` if the
    /// user was already assigned.
    #[instrument(skip(self))]
    pub async fn assign(&self, ids: &[u64], user: &str) -> Result<bool> {
        if ids.is_empty() {
            return Err(ApiError::Usage("no bugs to assign".to_string()));
        }

        let mut payload = Struct::new();
        payload.insert("ids".to_string(), Value::from(ids.to_vec()));
        payload.insert("assigned_to".to_string(), Value::from(user));

        let result = self.call("Bug.update", payload).await?;
        assignee_changed(&result)
    }

    /// Find bugs linked to a ticket in an external tracker.
    ///
    /// # Arguments
    ///
    /// * `tracker_url` - Base URL of the tracker, e.g. `http://tracker.ceph.com`
    /// * `ticket_id` - The ticket's ID in that tracker
    #[instrument(skip(self))]
    pub async fn find_by_external_tracker(
        &self,
        tracker_url: &str,
        ticket_id: &str,
    ) -> Result<Vec<Bug>> {
        let mut payload = Struct::new();
        payload.insert(
            "include_fields".to_string(),
            Value::from(SEARCH_FIELDS.to_vec()),
        );
        payload.insert("f1".to_string(), Value::from("external_bugzilla.url"));
        payload.insert("o1".to_string(), Value::from("substring"));
        payload.insert("v1".to_string(), Value::from(tracker_url));
        payload.insert("f2".to_string(), Value::from("ext_bz_bug_map.ext_bz_bug_id"));
        payload.insert("o2".to_string(), Value::from("equals"));
        payload.insert("v2".to_string(), Value::from(ticket_id));

        let result = self.call("Bug.search", payload).await?;
        let bugs = parse_bugs(result, &self.url)?;
        debug!("Found {} bugs for {} #{}", bugs.len(), tracker_url, ticket_id);
        Ok(bugs)
    }
}
