//! External tracker ticket URLs.
//!
//! Bugzilla links bugs to tickets in other trackers by (tracker base URL,
//! ticket ID). These helpers split a ticket URL such as
//! `http://tracker.ceph.com/issues/16673` into those two parts.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::api::ApiError;

/// Trailing digits of a ticket URL.
static TICKET_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)/?$").expect("ticket ID pattern is a valid regex"));

/// Split a ticket URL into the tracker base URL and the ticket ID.
///
/// Scheme-less input (`tracker.ceph.com/issues/16673`) is treated as http.
///
/// # Errors
///
/// Returns `ApiError::Usage` if the URL has no host or no trailing ticket
/// number.
pub fn parse_ticket_url(ticket_url: &str) -> Result<(String, String), ApiError> {
    Ok((tracker_base_url(ticket_url)?, ticket_id(ticket_url)?))
}

/// The `scheme://host[:port]` part of a ticket URL.
pub fn tracker_base_url(ticket_url: &str) -> Result<String, ApiError> {
    let with_scheme = if ticket_url.starts_with("http://") || ticket_url.starts_with("https://") {
        ticket_url.to_string()
    } else {
        format!("http://{}", ticket_url)
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|e| ApiError::Usage(format!("invalid ticket URL '{}': {}", ticket_url, e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ApiError::Usage(format!("no host in ticket URL '{}'", ticket_url)))?;

    Ok(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

/// The ticket number at the end of a ticket URL.
pub fn ticket_id(ticket_url: &str) -> Result<String, ApiError> {
    TICKET_ID_PATTERN
        .captures(ticket_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ApiError::Usage(format!("could not find a ticket ID in '{}'", ticket_url))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ticket_url() {
        let (base, id) = parse_ticket_url("http://tracker.ceph.com/issues/16673").unwrap();
        assert_eq!(base, "http://tracker.ceph.com");
        assert_eq!(id, "16673");
    }

    #[test]
    fn test_scheme_less_defaults_to_http() {
        let (base, id) = parse_ticket_url("tracker.ceph.com/issues/16673").unwrap();
        assert_eq!(base, "http://tracker.ceph.com");
        assert_eq!(id, "16673");
    }

    #[test]
    fn test_https_and_port_kept() {
        assert_eq!(
            tracker_base_url("https://issues.example.org:8443/browse/42").unwrap(),
            "https://issues.example.org:8443"
        );
    }

    #[test]
    fn test_trailing_slash() {
        assert_eq!(ticket_id("https://tracker.example.com/issues/99/").unwrap(), "99");
    }

    #[test]
    fn test_missing_ticket_id() {
        let err = ticket_id("http://tracker.ceph.com/projects/rgw").unwrap_err();
        assert!(matches!(err, ApiError::Usage(_)));
    }
}
