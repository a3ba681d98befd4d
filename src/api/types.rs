//! Bugzilla response types.
//!
//! These types model the structs returned by `Bug.get`, `Bug.search` and
//! `Bug.update`.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::{ApiError, Result};
use super::xmlrpc::{Struct, Value};

/// Endpoint suffix replaced by the bug number to build a web URL.
const RPC_SUFFIX: &str = "xmlrpc.cgi";

/// A bug record.
///
/// Which fields are filled depends on what was requested: summary
/// projections carry only `id` and `summary`, full records carry everything
/// the server returns, with the uncommon fields kept in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bug {
    /// The bug number.
    pub id: u64,
    /// One-line summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Status, e.g. `NEW` or `ASSIGNED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Login of the assignee.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Browser URL for this bug.
    pub weburl: String,
    /// All other fields returned by the server.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Bug {
    /// Build a bug from one record of a `bugs` array.
    ///
    /// # Arguments
    ///
    /// * `record` - The bug struct from the server
    /// * `endpoint` - The XML-RPC endpoint, used to derive `weburl`
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidResponse` if the record is not a struct or has
    /// no usable `id`.
    pub fn from_record(record: Value, endpoint: &str) -> Result<Self> {
        let Value::Struct(mut fields) = record else {
            return Err(ApiError::InvalidResponse(
                "bug record is not a struct".to_string(),
            ));
        };

        let id = match fields.remove("id") {
            Some(Value::Int(id)) if id >= 0 => id as u64,
            Some(Value::String(id)) => id.trim().parse().map_err(|_| {
                ApiError::InvalidResponse(format!("bug id '{}' is not a number", id))
            })?,
            Some(other) => {
                return Err(ApiError::InvalidResponse(format!(
                    "bug id has unexpected value {:?}",
                    other
                )))
            }
            None => {
                return Err(ApiError::InvalidResponse(
                    "bug record has no id".to_string(),
                ))
            }
        };

        // Derived below; a server-sent value would be stale for other hosts.
        fields.remove("weburl");

        Ok(Self {
            id,
            summary: take_string(&mut fields, "summary"),
            status: take_string(&mut fields, "status"),
            assigned_to: take_string(&mut fields, "assigned_to"),
            weburl: web_url(endpoint, id),
            fields,
        })
    }

    /// Get any field by name, including the named ones.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "summary" => self.summary.clone().map(Value::from),
            "status" => self.status.clone().map(Value::from),
            "assigned_to" => self.assigned_to.clone().map(Value::from),
            "weburl" => Some(Value::from(self.weburl.as_str())),
            other => self.fields.get(other).cloned(),
        }
    }
}

/// Build the browser URL of a bug from the XML-RPC endpoint.
///
/// `https://host/xmlrpc.cgi` becomes `https://host/1234`.
pub fn web_url(endpoint: &str, id: u64) -> String {
    match endpoint.rfind(RPC_SUFFIX) {
        Some(pos) => format!(
            "{}{}{}",
            &endpoint[..pos],
            id,
            &endpoint[pos + RPC_SUFFIX.len()..]
        ),
        None => format!("{}/{}", endpoint.trim_end_matches('/'), id),
    }
}

fn take_string(fields: &mut Struct, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            fields.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

/// Parse the `bugs` array of a `Bug.get` or `Bug.search` result.
pub(crate) fn parse_bugs(response: Value, endpoint: &str) -> Result<Vec<Bug>> {
    let Value::Struct(mut result) = response else {
        return Err(ApiError::InvalidResponse(
            "result is not a struct".to_string(),
        ));
    };

    match result.remove("bugs") {
        Some(Value::Array(records)) => records
            .into_iter()
            .map(|record| Bug::from_record(record, endpoint))
            .collect(),
        _ => Err(ApiError::InvalidResponse(
            "result has no bugs array".to_string(),
        )),
    }
}

/// Check a `Bug.update` result for an assignee change on its first bug.
///
/// Returns `false` when the update was a no-op (already assigned).
pub(crate) fn assignee_changed(response: &Value) -> Result<bool> {
    let first = response
        .get("bugs")
        .and_then(Value::as_array)
        .and_then(|bugs| bugs.first())
        .ok_or_else(|| {
            ApiError::InvalidResponse("update result has no bugs".to_string())
        })?;

    let changes = first.get("changes").and_then(Value::as_struct).ok_or_else(|| {
        ApiError::InvalidResponse("update result has no changes".to_string())
    })?;

    Ok(changes.contains_key("assigned_to"))
}
