//! `reqwest` adapter for the remote registry API.

use crate::errors::{ApiError, ApiResult};
use crate::registry::ports::RegistryApi;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Header carrying the client's API version.
pub const API_VERSION_HEADER: &str = "x-api-version";

const STORE_SCOPE: &str = "for_store";

/// Errors raised while constructing [`HttpRegistryApi`].
#[derive(Debug, Clone, Error)]
pub enum HttpRegistryApiError {
    /// The base URL is not an absolute URL that can carry a path.
    #[error("invalid registry base url '{url}': {reason}")]
    InvalidBaseUrl {
        /// URL as supplied.
        url: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The API version is not a valid header value.
    #[error("invalid API version header value '{0}'")]
    InvalidApiVersion(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(Arc<reqwest::Error>),
}

/// Registry API client over HTTP.
///
/// Every request carries the configured API version header and timeout.
/// Transport failures and non-2xx responses are classified into
/// [`ApiError`] variants; response bodies are returned as parsed JSON.
#[derive(Debug, Clone)]
pub struct HttpRegistryApi {
    client: Client,
    base_url: Url,
}

impl HttpRegistryApi {
    /// Creates a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpRegistryApiError`] when the URL or header value is
    /// invalid, or the client cannot be built.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        api_version: &str,
    ) -> Result<Self, HttpRegistryApiError> {
        let parsed = Url::parse(base_url).map_err(|err| HttpRegistryApiError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: err.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(HttpRegistryApiError::InvalidBaseUrl {
                url: base_url.to_owned(),
                reason: "URL cannot carry a path".to_owned(),
            });
        }
        let version = HeaderValue::from_str(api_version)
            .map_err(|_| HttpRegistryApiError::InvalidApiVersion(api_version.to_owned()))?;
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_VERSION_HEADER), version);
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| HttpRegistryApiError::Client(Arc::new(err)))?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Request("registry base url cannot carry a path".to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn store_request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let path: Vec<&str> = std::iter::once(STORE_SCOPE)
            .chain(segments.iter().copied())
            .collect();
        Ok(self.client.request(method, self.endpoint(&path)?))
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Value> {
        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "registry responded");
        let text = response.text().await.map_err(classify_transport_error)?;
        let body = if text.trim().is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str::<Value>(&text).ok()
        };

        if status.is_success() {
            return body.ok_or_else(|| ApiError::decode("response body is not valid JSON"));
        }
        let message = body
            .as_ref()
            .and_then(error_message)
            .or_else(|| status.canonical_reason().map(str::to_owned))
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
        Err(ApiError::Response {
            status: status.as_u16(),
            message,
            body: body.filter(|value| !value.is_null()),
        })
    }
}

fn error_message(body: &Value) -> Option<String> {
    [
        body.pointer("/error/message"),
        body.get("message"),
        body.get("detail"),
        body.get("error"),
    ]
    .into_iter()
    .flatten()
    .find_map(Value::as_str)
    .map(str::to_owned)
}

fn classify_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::no_response(err.to_string(), true)
    } else if err.is_builder() {
        ApiError::Request(err.to_string())
    } else {
        ApiError::no_response(err.to_string(), false)
    }
}

#[async_trait]
impl RegistryApi for HttpRegistryApi {
    async fn list_services(&self) -> ApiResult<Value> {
        self.send(self.store_request(Method::GET, &["list_services"])?)
            .await
    }

    async fn list_tools(&self) -> ApiResult<Value> {
        self.send(self.store_request(Method::GET, &["list_tools"])?)
            .await
    }

    async fn list_agents(&self) -> ApiResult<Value> {
        self.send(self.store_request(Method::GET, &["list_agents"])?)
            .await
    }

    async fn check_services(&self) -> ApiResult<Value> {
        self.send(self.store_request(Method::GET, &["check_services"])?)
            .await
    }

    async fn add_service(&self, config: &Value) -> ApiResult<Value> {
        let request = self.store_request(Method::POST, &["add_service"])?;
        self.send(request.json(config)).await
    }

    async fn update_service(&self, name: &str, config: &Value) -> ApiResult<Value> {
        let request = self.store_request(Method::PUT, &["update_service", name])?;
        self.send(request.json(config)).await
    }

    async fn delete_service(&self, name: &str) -> ApiResult<Value> {
        self.send(self.store_request(Method::DELETE, &["delete_service", name])?)
            .await
    }

    async fn restart_service(&self, name: &str) -> ApiResult<Value> {
        let request = self.store_request(Method::POST, &["restart_service"])?;
        self.send(request.json(&json!({ "name": name }))).await
    }

    async fn batch_update_services(&self, updates: &Value) -> ApiResult<Value> {
        let request = self.store_request(Method::POST, &["batch_update_services"])?;
        self.send(request.json(&json!({ "updates": updates }))).await
    }

    async fn batch_delete_services(&self, names: &[String]) -> ApiResult<Value> {
        let request = self.store_request(Method::POST, &["batch_delete_services"])?;
        self.send(request.json(&json!({ "service_names": names })))
            .await
    }

    async fn batch_restart_services(&self, names: &[String]) -> ApiResult<Value> {
        let request = self.store_request(Method::POST, &["batch_restart_services"])?;
        self.send(request.json(&json!({ "service_names": names })))
            .await
    }

    async fn call_tool(&self, name: &str, args: &Value) -> ApiResult<Value> {
        let request = self.store_request(Method::POST, &["call_tool"])?;
        self.send(request.json(&json!({ "tool_name": name, "args": args })))
            .await
    }

    async fn tool_records(&self, limit: usize) -> ApiResult<Value> {
        let request = self.store_request(Method::GET, &["tool_records"])?;
        self.send(request.query(&[("limit", limit)])).await
    }

    async fn system_resources(&self) -> ApiResult<Value> {
        self.send(self.store_request(Method::GET, &["system_resources"])?)
            .await
    }

    async fn health_summary(&self) -> ApiResult<Value> {
        let url = self.endpoint(&["health", "summary"])?;
        self.send(self.client.get(url)).await
    }
}
