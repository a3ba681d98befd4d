//! bugzilla-rpc - an async client for the Bugzilla XML-RPC API
//!
//! Connect (anonymously, with an API key, a stored credential, or a
//! username and password), then fetch, assign and search bugs:
//!
//! ```no_run
//! use bugzilla_rpc::{connect, ConnectOptions, CredentialStore};
//!
//! # async fn example() -> Result<(), bugzilla_rpc::ApiError> {
//! let store = CredentialStore::default_location()?;
//! let bz = connect(ConnectOptions::new().credential_store(store)).await?;
//!
//! let bug = bz.get_bug(1422893).await?;
//! println!("{} {}", bug.weburl, bug.summary.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod tracker;

pub use api::{
    connect, ApiError, AuthMode, Bug, ConnectOptions, Connection, Credential, Fault, FaultKind,
    Transport, Value, DEFAULT_URL,
};
pub use config::{CredentialStore, Settings};
