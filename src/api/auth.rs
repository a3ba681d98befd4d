//! Authentication handling for the Bugzilla API.
//!
//! Bugzilla accepts credentials in two places: as a field inside each call's
//! payload, or as an `Authorization: Bearer` header. Which one a server
//! understands depends on how it is deployed, so the choice is an
//! [`AuthMode`].

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::xmlrpc::{Struct, Value};

/// Host of the vendor-run instance, which only takes header credentials.
pub const VENDOR_HOST: &str = "bugzilla.redhat.com";

/// Payload field carrying an API key.
pub const API_KEY_FIELD: &str = "Bugzilla_api_key";

/// Payload field carrying a login token.
pub const TOKEN_FIELD: &str = "Bugzilla_token";

/// A credential for a Bugzilla server.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// An API key issued by the server's preferences page.
    ApiKey(String),
    /// A legacy session token returned by `User.login`.
    Token(String),
}

impl Credential {
    /// The raw secret.
    pub fn secret(&self) -> &str {
        match self {
            Credential::ApiKey(s) | Credential::Token(s) => s,
        }
    }

    /// The payload field this credential travels in.
    pub fn payload_field(&self) -> &'static str {
        match self {
            Credential::ApiKey(_) => API_KEY_FIELD,
            Credential::Token(_) => TOKEN_FIELD,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credential::Token(_) => f.write_str("Token(<redacted>)"),
        }
    }
}

/// Where API keys are placed on outgoing calls.
///
/// Tokens always go in the payload; only API keys are affected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Header` for the vendor-run instance, `Payload` everywhere else.
    #[default]
    Auto,
    /// Bearer header only.
    Header,
    /// `Bugzilla_api_key` payload field only.
    Payload,
    /// Both the header and the payload field.
    Both,
}

impl AuthMode {
    /// Resolve `Auto` for a concrete server URL.
    pub fn resolve(self, url: &str) -> AuthMode {
        match self {
            AuthMode::Auto if is_vendor_host(url) => AuthMode::Header,
            AuthMode::Auto => AuthMode::Payload,
            explicit => explicit,
        }
    }

    fn uses_header(self) -> bool {
        matches!(self, AuthMode::Header | AuthMode::Both)
    }

    fn uses_payload(self) -> bool {
        matches!(self, AuthMode::Payload | AuthMode::Both)
    }
}

/// Check whether a URL points at the vendor-run instance.
pub fn is_vendor_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(VENDOR_HOST)))
        .unwrap_or(false)
}

/// The bearer key to send as a header, if any.
///
/// `mode` must already be resolved.
pub fn bearer_key(credential: Option<&Credential>, mode: AuthMode) -> Option<&str> {
    match credential {
        Some(Credential::ApiKey(key)) if mode.uses_header() => Some(key),
        _ => None,
    }
}

/// Add the payload credential field, if this credential and mode call for one.
///
/// `mode` must already be resolved.
pub fn authenticate_payload(payload: &mut Struct, credential: Option<&Credential>, mode: AuthMode) {
    let Some(credential) = credential else {
        return;
    };
    let in_payload = match credential {
        Credential::Token(_) => true,
        Credential::ApiKey(_) => mode.uses_payload(),
    };
    if in_payload {
        payload.insert(
            credential.payload_field().to_string(),
            Value::from(credential.secret()),
        );
    }
}
