//! HTTP implementation of the REST transport

use super::RestError;
use async_trait::async_trait;
use gateway_common::{ApiConfig, ClientIdentity, GatewayConfig};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;

/// Longest path accepted, in characters
pub const MAX_PATH_LEN: usize = 2000;

/// HTTP methods used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Patch => Self::PATCH,
            Method::Delete => Self::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request/response transport the gateway core depends on
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Perform a request; `body` is sent as JSON when present
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, RestError>;
}

/// `reqwest`-backed REST client
#[derive(Debug, Clone)]
pub struct HttpRestClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRestClient {
    /// Build a client that authenticates with `token`
    pub fn new(token: &str, api: &ApiConfig) -> Result<Self, RestError> {
        let mut headers = HeaderMap::new();
        let mut auth =
            HeaderValue::from_str(&format!("Bot {token}")).map_err(|_| RestError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(ClientIdentity::client_name())
            .timeout(api.timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from the gateway configuration
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RestError> {
        Self::new(&config.token, &config.api)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a request and decode the JSON response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, RestError> {
        let bytes = self.request(method, path, body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl RestTransport for HttpRestClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, RestError> {
        let length = path.chars().count();
        if length > MAX_PATH_LEN {
            return Err(RestError::PathTooLong(length));
        }

        let url = self.url(path);
        tracing::debug!(method = %method, url = %url, "Sending REST request");

        let mut request = self.http.request(method.into(), &url);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body);
        }

        let response = request.send().await.inspect_err(|e| {
            tracing::warn!(method = %method, url = %url, error = %e, "REST request failed");
        })?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            tracing::warn!(method = %method, url = %url, status = status.as_u16(), "REST request rejected");
            return Err(RestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(bytes.to_vec())
    }
}
