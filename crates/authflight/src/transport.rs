//! Transport boundary: request/response values and the wire trait.
//!
//! Requests are immutable values; attaching a credential derives a new
//! request rather than mutating a shared one, so a retry can never observe a
//! half-updated request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;

use crate::error::{Error, Result};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An outgoing request, independent of any HTTP client type.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the transport's base URL.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
    /// Extra headers.
    pub headers: HeaderMap,
}

impl ApiRequest {
    /// Create a request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// Create a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body.
    pub fn json<B: serde::Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Derive a new request carrying `Authorization: Bearer <credential>`.
    ///
    /// The original request is left untouched; each dispatch attempt builds
    /// its own value from the original plus the credential in hand.
    pub fn with_bearer(&self, credential: &str) -> Result<Self> {
        let value = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| Error::Config("credential is not a valid header value".to_string()))?;

        let mut derived = self.clone();
        derived.headers.insert(AUTHORIZATION, value);
        Ok(derived)
    }
}

/// A response as seen by the interceptors: any HTTP status is a response,
/// only connection-level failures are errors.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: reqwest::StatusCode,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the response is an authentication rejection.
    pub fn is_auth_rejection(&self) -> bool {
        self.status == reqwest::StatusCode::UNAUTHORIZED
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }

    /// The body as text, lossily decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for the underlying HTTP transport.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Issue a request and return the response, whatever its status.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Shared transport handle.
pub type SharedTransport = Arc<dyn Transport>;

/// reqwest-backed transport.
#[derive(Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a URL for a request path.
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(Error::from)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let ApiRequest {
            method,
            path,
            body,
            headers,
        } = request;
        let url = self.url(&path)?;

        let mut builder = self
            .http
            .request(method, url)
            .headers(headers)
            .timeout(self.timeout);

        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_bearer_derives_a_new_request() {
        let original = ApiRequest::get("things");
        let derived = original.with_bearer("tok-1").unwrap();

        assert!(original.headers.get(AUTHORIZATION).is_none());
        assert_eq!(
            derived.headers.get(AUTHORIZATION).unwrap(),
            "Bearer tok-1"
        );

        // Deriving again replaces the header rather than appending.
        let rederived = derived.with_bearer("tok-2").unwrap();
        assert_eq!(
            rederived.headers.get(AUTHORIZATION).unwrap(),
            "Bearer tok-2"
        );
        assert_eq!(rederived.headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn test_with_bearer_rejects_invalid_header_value() {
        let request = ApiRequest::get("things");
        assert!(matches!(
            request.with_bearer("bad\ntoken"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_url_building() {
        let transport = HttpTransport::new("http://localhost:8000").unwrap();

        let url = transport.url("things").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/things");

        let url = transport.url("/things").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/things");
    }

    #[test]
    fn test_json_body_attach() {
        let request = ApiRequest::post("things")
            .json(&serde_json::json!({ "name": "widget" }))
            .unwrap();
        assert_eq!(request.body.unwrap()["name"], "widget");
    }

    #[test]
    fn test_auth_rejection_detection() {
        let rejected = ApiResponse {
            status: reqwest::StatusCode::UNAUTHORIZED,
            body: Vec::new(),
        };
        assert!(rejected.is_auth_rejection());

        let forbidden = ApiResponse {
            status: reqwest::StatusCode::FORBIDDEN,
            body: Vec::new(),
        };
        assert!(!forbidden.is_auth_rejection());
    }
}
