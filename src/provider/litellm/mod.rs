//! LiteLLM Proxy REST Client
//!
//! Thin transport over the LiteLLM proxy management API shared by the `Key`
//! and `Team` adapters.
//!
//! - Every request carries `Authorization: Bearer <master key>` and
//!   `Content-Type: application/json`
//! - HTTP 404 is reported as `None` so callers decide what "absent" means
//! - Other non-success statuses, network failures and timeouts are transport
//!   errors; unparseable bodies are decode errors
//!
//! References:
//! - [LiteLLM proxy key management](https://docs.litellm.ai/docs/proxy/virtual_keys)

pub mod requests;
pub mod responses;

use crate::controller::reconciler::{ClientParams, ExternalError};
use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use zeroize::Zeroizing;

use responses::ErrorResponse;

/// Authenticated client for one LiteLLM proxy
pub struct LiteLlmClient {
    http_client: Client,
    api_base: String,
    api_key: Zeroizing<String>,
}

impl std::fmt::Debug for LiteLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteLlmClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl LiteLlmClient {
    /// Create a client for the proxy at `params.api_base`
    ///
    /// # Errors
    /// Returns an error if the base URL is not an absolute http(s) URL, the
    /// API key is empty, or the HTTP client cannot be built
    pub fn new(params: ClientParams) -> Result<Self> {
        let api_base = params.api_base.trim().trim_end_matches('/').to_string();
        let url = Url::parse(&api_base)
            .with_context(|| format!("Invalid LiteLLM API base URL: {:?}", params.api_base))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!(
                "LiteLLM API base URL must use http or https, got {}",
                url.scheme()
            );
        }
        if params.api_key.trim().is_empty() {
            anyhow::bail!("LiteLLM API key is empty");
        }

        let http_client = Client::builder()
            .timeout(params.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_base,
            api_key: params.api_key,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build HTTP request with authentication headers
    fn make_request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.api_base, path);
        self.http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .header("Content-Type", "application/json")
    }

    /// `GET path?query`; `Ok(None)` on 404
    pub async fn get<R: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<R>, ExternalError> {
        let request = self.make_request(Method::GET, path).query(query);
        self.send(operation, request).await
    }

    /// `POST path` with a JSON body; `Ok(None)` on 404
    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Option<R>, ExternalError> {
        let request = self.make_request(Method::POST, path).json(body);
        self.send(operation, request).await
    }

    async fn send<R: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<Option<R>, ExternalError> {
        let response = request
            .send()
            .await
            .map_err(|e| transport(operation, describe(&e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport(operation, describe(&e)))?;
        debug!(operation, status = status.as_u16(), "LiteLLM response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(transport(operation, error_message(status, &body)));
        }

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ExternalError::Decode {
                operation,
                message: e.to_string(),
            })
    }
}

fn transport(operation: &'static str, message: String) -> ExternalError {
    ExternalError::Transport { operation, message }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("timed out: {error}")
    } else {
        error.to_string()
    }
}

/// Render a proxy error body, preferring its structured message
fn error_message(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(parsed) => match parsed.message() {
            Some(message) => format!("HTTP {}: {}", status.as_u16(), message),
            None => format!("HTTP {}", status.as_u16()),
        },
        Err(_) => format!(
            "HTTP {}: {}",
            status.as_u16(),
            String::from_utf8_lossy(body).trim()
        ),
    }
}
