use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::appliance::ApplianceApi;
use super::common::{ApiErrorDetails, ApiErrorResponse};
use super::disk::DiskApi;
use super::error::ApiError;
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager, ConnectionStats};
use super::server::ServerApi;

pub const DEFAULT_API_ROOT_URL: &str = "https://secure.sakura.ad.jp/cloud/zone";
const API_PATH: &str = "/api/cloud/1.1";

/// SakuraCloud API client
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    root_url: String,
    access_token: String,
    access_token_secret: String,
    retry_config: RetryConfig,
    pool_manager: ConnectionPoolManager,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 300,
        }
    }
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(
        root_url: &str,
        access_token: &str,
        access_token_secret: &str,
    ) -> Result<Self, ApiError> {
        Self::with_config(
            root_url,
            access_token,
            access_token_secret,
            RetryConfig::default(),
        )
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        root_url: &str,
        access_token: &str,
        access_token_secret: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        url::Url::parse(root_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", root_url, e)))?;

        let pool_manager = ConnectionPoolManager::new(ConnectionPoolConfig {
            request_timeout: Duration::from_secs(retry_config.timeout_seconds),
            ..Default::default()
        });
        let http_client = pool_manager.build_client()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                root_url: root_url.trim_end_matches('/').to_string(),
                access_token: access_token.to_string(),
                access_token_secret: access_token_secret.to_string(),
                retry_config,
                pool_manager,
            }),
        })
    }

    /// Full URL of an API path in the given zone
    pub fn zone_url(&self, zone: &str, path: &str) -> String {
        format!("{}/{}{}{}", self.inner.root_url, zone, API_PATH, path)
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry_config
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.inner.pool_manager.stats()
    }

    /// Server API operations
    pub fn server(&self, zone: &str) -> ServerApi<'_> {
        ServerApi::new(self, zone)
    }

    /// Disk API operations
    pub fn disk(&self, zone: &str) -> DiskApi<'_> {
        DiskApi::new(self, zone)
    }

    /// Appliance (load balancer, database, VPC router, NFS, mobile gateway) operations
    pub fn appliance(&self, zone: &str) -> ApplianceApi<'_> {
        ApplianceApi::new(self, zone)
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: DeserializeOwned>(&self, zone: &str, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, zone, path, None).await
    }

    /// Execute a POST request with retry logic
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        zone: &str,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = to_json(body)?;
        self.request(Method::POST, zone, path, Some(body)).await
    }

    /// Execute a body-less PUT request with retry logic
    pub async fn put<T: DeserializeOwned>(&self, zone: &str, path: &str) -> Result<T, ApiError> {
        self.request(Method::PUT, zone, path, None).await
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete<T: DeserializeOwned>(&self, zone: &str, path: &str) -> Result<T, ApiError> {
        self.request(Method::DELETE, zone, path, None).await
    }

    /// Execute a DELETE request carrying a JSON body
    pub async fn delete_with_body<T: DeserializeOwned, B: Serialize>(
        &self,
        zone: &str,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = to_json(body)?;
        self.request(Method::DELETE, zone, path, Some(body)).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        zone: &str,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let url = self.zone_url(zone, path);
        let idempotent = method != Method::POST;

        self.execute_with_retry(
            || {
                tracing::debug!("{} request to: {}", method, url);

                let mut request = self
                    .inner
                    .http_client
                    .request(method.clone(), &url)
                    .basic_auth(
                        &self.inner.access_token,
                        Some(&self.inner.access_token_secret),
                    );
                if let Some(body) = &body {
                    request = request.json(body);
                }
                request.send()
            },
            &url,
            idempotent,
        )
        .await
    }

    /// Execute request with retry logic.
    ///
    /// 423, 429 and connect errors are retried for every method. 5xx and
    /// timeouts may mean the server already acted on the request, so they are
    /// only retried when `idempotent` is set.
    async fn execute_with_retry<F, Fut, T>(
        &self,
        request_fn: F,
        url: &str,
        idempotent: bool,
    ) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: DeserializeOwned,
    {
        let config = &self.inner.retry_config;
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    config
                        .initial_backoff_ms
                        .saturating_mul(2_u64.saturating_pow(attempt - 1)),
                    config.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    url,
                    backoff,
                    attempt
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        self.inner.pool_manager.record_request(true);
                        return self.parse_success_response(response).await;
                    }

                    self.inner.pool_manager.record_request(false);

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(ApiError::AuthError);
                    }

                    if status == StatusCode::LOCKED {
                        last_error = Some(ApiError::Locked);
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() && idempotent {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return self.handle_error_response(response).await;
                    }
                }
                Err(e) => {
                    self.inner.pool_manager.record_request(false);

                    if e.is_timeout() {
                        if !idempotent {
                            return Err(ApiError::Timeout(config.timeout_seconds));
                        }
                        last_error = Some(ApiError::Timeout(config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response. An empty body decodes like JSON `null`.
    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        let body = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str::<T>(body).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    /// Handle error response
    async fn handle_error_response<T>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let (message, details) = match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(err_resp) => {
                let message = err_resp.error_msg.clone().unwrap_or_else(|| text.clone());
                (message, Some(Box::new(ApiErrorDetails::from(err_resp))))
            }
            Err(_) => (text, None),
        };

        Err(ApiError::ApiError {
            status,
            message,
            details,
        })
    }
}

fn to_json<B: Serialize>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::ParseError(format!("Failed to encode request body: {}", e)))
}
