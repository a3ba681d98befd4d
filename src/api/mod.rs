//! Bugzilla XML-RPC client and types.
//!
//! This module provides the interface for communicating with a Bugzilla
//! server over XML-RPC.

mod auth;
mod client;
pub mod error;
mod transport;
mod types;
pub mod xmlrpc;

pub use auth::{is_vendor_host, AuthMode, Credential, VENDOR_HOST};
pub use client::{connect, ConnectOptions, Connection, DEFAULT_URL};
pub use error::{ApiError, Fault, FaultKind};
pub use transport::{HttpTransport, Transport};
pub use types::{web_url, Bug};
pub use xmlrpc::{Struct, Value};
