//! HTTP transport for the NetAPI.
//!
//! The [`Transport`] trait is the seam between request construction (done by
//! [`crate::session::Session`]) and the wire. [`HttpTransport`] is the
//! production implementation over `reqwest`; tests substitute their own.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;

use crate::config::ClientConfig;
use crate::error::{NetapiError, Result};

/// Header carrying the session token once authenticated.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

const JSON: &str = "application/json";

/// A fully-formed request ready to be sent.
#[derive(Clone)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Session token; the auth header is only sent when this is non-empty.
    pub token: Option<String>,
    /// Encoded JSON body. `None` sends no body at all, which is distinct from `{}`.
    pub body: Option<Vec<u8>>,
}

impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("authenticated", &self.token.is_some())
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

/// Sends requests to the master and classifies the outcome.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the raw response body.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::Transport`] if the request could not be
    /// completed and [`NetapiError::RequestFailed`] for any status outside
    /// 200-299. The body of a failed response is never decoded.
    async fn execute(&self, request: OutboundRequest) -> Result<Vec<u8>>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport whose TLS and timeout policy follow `config`.
    ///
    /// # Errors
    ///
    /// Returns [`NetapiError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(NetapiError::Transport)?;
        Ok(Self { client })
    }

    /// Create a transport with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: OutboundRequest) -> Result<Vec<u8>> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            has_body = request.body.is_some(),
            "Sending request"
        );

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .header(ACCEPT, HeaderValue::from_static(JSON))
            .header(CONTENT_TYPE, HeaderValue::from_static(JSON));

        if let Some(token) = request.token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&token).map_err(|e| {
                NetapiError::Config(format!("session token is not a valid header value: {e}"))
            })?;
            builder = builder.header(AUTH_TOKEN_HEADER, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(NetapiError::Transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(NetapiError::Transport)?;

        tracing::debug!(
            status = %status,
            url = %request.url,
            bytes = body.len(),
            "Received response"
        );

        if !status.is_success() {
            return Err(NetapiError::RequestFailed {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request(server: &MockServer, token: Option<&str>, body: Option<&str>) -> OutboundRequest {
        OutboundRequest {
            method: Method::POST,
            url: format!("{}/echo", server.uri()),
            token: token.map(ToString::to_string),
            body: body.map(|b| b.as_bytes().to_vec()),
        }
    }

    #[tokio::test]
    async fn sets_negotiation_and_token_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("Accept", JSON))
            .and(header("Content-Type", JSON))
            .and(header(AUTH_TOKEN_HEADER, "abc123"))
            .and(body_string("{}"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::with_client(reqwest::Client::new());
        let body = transport
            .execute(request(&server, Some("abc123"), Some("{}")))
            .await
            .unwrap();
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn omits_token_header_when_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::with_client(reqwest::Client::new());
        transport
            .execute(request(&server, Some(""), None))
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        assert!(received[0].headers.get(AUTH_TOKEN_HEADER).is_none());
        assert!(received[0].body.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_keeps_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("<html>denied</html>"))
            .mount(&server)
            .await;

        let transport = HttpTransport::with_client(reqwest::Client::new());
        let err = transport
            .execute(request(&server, None, None))
            .await
            .unwrap_err();

        match err {
            NetapiError::RequestFailed { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "<html>denied</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        let transport = HttpTransport::with_client(reqwest::Client::new());
        let err = transport
            .execute(OutboundRequest {
                method: Method::GET,
                url: "http://127.0.0.1:1/unreachable".to_string(),
                token: None,
                body: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NetapiError::Transport(_)));
        assert!(err.is_transport_failure());
    }

    #[test]
    fn debug_hides_token() {
        let req = OutboundRequest {
            method: Method::GET,
            url: "http://master/minions".into(),
            token: Some("secret-token".into()),
            body: None,
        };
        assert!(!format!("{req:?}").contains("secret-token"));
    }
}
