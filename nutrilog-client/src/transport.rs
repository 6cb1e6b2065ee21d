//! HTTP transport over `reqwest` with a cookie-backed session.

use async_trait::async_trait;
use nutrilog_core::{ApiError, ApiRequest, ApiResult, Method, Transport};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// [`Transport`] that talks to the remote API.
///
/// The underlying client keeps a cookie store, so the session cookie set by
/// login or refresh is attached to every later request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, &config.api_base_url))
    }

    /// Use a preconfigured client. It should have a cookie store enabled.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> ApiResult<Value> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method()), self.url(request.path()));
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            debug!(method = %request.method(), path = request.path(), error = %err, "request failed");
            ApiError::network(err.to_string())
        })?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .is_some_and(is_json_content_type);
        let body = response
            .bytes()
            .await
            .map_err(|err| ApiError::network(err.to_string()))?;

        debug!(
            method = %request.method(),
            path = request.path(),
            status = status.as_u16(),
            "api response"
        );

        if status.is_success() {
            Ok(decode_success(status, is_json, &body))
        } else {
            Err(ApiError::from_response(
                status.as_u16(),
                status.canonical_reason(),
                &body,
            ))
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn is_json_content_type(value: &HeaderValue) -> bool {
    value
        .to_str()
        .map(|content_type| {
            let mime = content_type.split(';').next().unwrap_or("").trim();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// 204 and empty bodies are `Null`. JSON bodies that fail to parse are kept
/// as raw text, as are bodies of any other content type.
fn decode_success(status: StatusCode, is_json: bool, body: &[u8]) -> Value {
    if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    if is_json {
        if let Ok(value) = serde_json::from_slice(body) {
            return value;
        }
    }
    Value::String(String::from_utf8_lossy(body).into_owned())
}
