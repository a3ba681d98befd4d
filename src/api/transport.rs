//! Transports that carry XML-RPC calls to the server.
//!
//! [`Transport`] is the seam between [`Connection`](super::Connection) and the
//! network. [`HttpTransport`] is the real one: it POSTs an encoded
//! `methodCall` and adds a bearer header when it holds an API key.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::{ApiError, Result};
use super::xmlrpc::{decode_response, encode_call, MethodResponse, Value};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("bugzilla-rpc/", env!("CARGO_PKG_VERSION"));

/// Content type of XML-RPC request bodies.
const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Something that can execute one XML-RPC call.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Call `method` with positional `params`.
    ///
    /// Faults come back as `ApiError::Fault`; network failures as
    /// `ApiError::Transport`.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value>;
}

/// XML-RPC over HTTP(S).
#[derive(Clone)]
pub struct HttpTransport {
    /// The HTTP client.
    client: Client,
    /// The XML-RPC endpoint.
    url: String,
    /// API key sent as `Authorization: Bearer`.
    bearer: Option<String>,
}

impl HttpTransport {
    /// Create a transport for an endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - The XML-RPC endpoint, e.g. `https://bugzilla.example.com/xmlrpc.cgi`
    /// * `bearer` - API key to send in the `Authorization` header
    /// * `timeout` - Per-request timeout; `None` waits indefinitely
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(url: &str, bearer: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        Url::parse(url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", url, e)))?;

        if !url.starts_with("https://") && bearer.is_some() {
            warn!("Sending an API key over plain HTTP to {}", url);
        }

        Ok(Self {
            client: Self::build_http_client(timeout)?,
            url: url.to_string(),
            bearer: bearer.map(str::to_string),
        })
    }

    fn build_http_client(timeout: Option<Duration>) -> Result<Client> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(ApiError::Transport)
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether requests carry a bearer header.
    pub fn has_bearer(&self) -> bool {
        self.bearer.is_some()
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url)
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, params), fields(url = %self.url))]
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let body = encode_call(method, &params);
        debug!(bytes = body.len(), "Sending XML-RPC request");

        let mut request = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body);
        if let Some(key) = &self.bearer {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            debug!("Error response body: {}", text);
            return Err(ApiError::from_status(status, &text));
        }

        match decode_response(&text)? {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault { code, message } => {
                warn!(code, "XML-RPC fault: {}", message);
                Err(ApiError::from_fault(code, message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::FaultKind;
    use crate::api::xmlrpc::{encode_fault, encode_response, Struct};
    use mockito::Matcher;

    fn ok_body() -> String {
        let mut result = Struct::new();
        result.insert("bugs".to_string(), Value::Array(vec![]));
        encode_response(&Value::Struct(result))
    }

    #[tokio::test]
    async fn test_call_posts_xml_and_decodes_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/xmlrpc.cgi")
            .match_header("content-type", XML_CONTENT_TYPE)
            .match_header("user-agent", Matcher::Regex("^bugzilla-rpc/".to_string()))
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Regex(
                "<methodName>Bug.get</methodName>".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body(ok_body())
            .create_async()
            .await;

        let transport =
            HttpTransport::new(&format!("{}/xmlrpc.cgi", server.url()), None, None).unwrap();
        let result = transport.call("Bug.get", vec![Value::Struct(Struct::new())]).await;

        mock.assert_async().await;
        let value = result.unwrap();
        assert_eq!(value.get("bugs"), Some(&Value::Array(vec![])));
    }

    #[tokio::test]
    async fn test_bearer_header_injected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/xmlrpc.cgi")
            .match_header("authorization", "Bearer abc-123")
            .with_status(200)
            .with_body(ok_body())
            .create_async()
            .await;

        let transport = HttpTransport::new(
            &format!("{}/xmlrpc.cgi", server.url()),
            Some("abc-123"),
            None,
        )
        .unwrap();
        assert!(transport.has_bearer());

        transport.call("Bug.get", vec![]).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fault_is_mapped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/xmlrpc.cgi")
            .with_status(200)
            .with_body(encode_fault(101, "Bug #1 does not exist."))
            .create_async()
            .await;

        let transport =
            HttpTransport::new(&format!("{}/xmlrpc.cgi", server.url()), None, None).unwrap();
        let err = transport.call("Bug.get", vec![]).await.unwrap_err();

        assert_eq!(err.fault_kind(), Some(FaultKind::NotFound));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/xmlrpc.cgi")
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let transport =
            HttpTransport::new(&format!("{}/xmlrpc.cgi", server.url()), None, None).unwrap();
        let err = transport.call("Bug.get", vec![]).await.unwrap_err();

        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "Service Unavailable");
            }
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/xmlrpc.cgi")
            .with_status(200)
            .with_body("<html><body>login required</body></html>")
            .create_async()
            .await;

        let transport =
            HttpTransport::new(&format!("{}/xmlrpc.cgi", server.url()), None, None).unwrap();
        let err = transport.call("Bug.get", vec![]).await.unwrap_err();

        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = HttpTransport::new("http://127.0.0.1:1/xmlrpc.cgi", None, None).unwrap();
        let err = transport.call("Bug.get", vec![]).await.unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = HttpTransport::new("not a url", None, None).unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[test]
    fn test_debug_redacts_bearer() {
        let transport =
            HttpTransport::new("https://bugzilla.example.com/xmlrpc.cgi", Some("sekrit"), None)
                .unwrap();
        let debug_output = format!("{:?}", transport);
        assert!(!debug_output.contains("sekrit"));
        assert!(debug_output.contains("bugzilla.example.com"));
    }
}
