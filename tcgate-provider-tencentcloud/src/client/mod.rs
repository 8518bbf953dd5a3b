//! Signed JSON client for Tencent Cloud APIs
//!
//! `ApiTransport` is the seam between service facades and the network: the
//! real implementation signs and sends requests, tests plug in a scripted one.

mod error;
mod http;
mod ratelimit;
mod sign;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

pub use error::ApiError;
pub use ratelimit::{DEFAULT_CALLS_PER_SECOND, RateLimiter};
pub use sign::Credential;

use http::{create_http_client, execute_with_retry, truncate_for_log};

pub const DEFAULT_REGION: &str = "ap-guangzhou";
pub const ENV_SECRET_ID: &str = "TENCENTCLOUD_SECRET_ID";
pub const ENV_SECRET_KEY: &str = "TENCENTCLOUD_SECRET_KEY";
pub const ENV_REGION: &str = "TENCENTCLOUD_REGION";

/// Cloud product an action belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ApiGateway,
    Clb,
    Audit,
}

impl Endpoint {
    pub fn host(self) -> &'static str {
        match self {
            Endpoint::ApiGateway => "apigateway.tencentcloudapi.com",
            Endpoint::Clb => "clb.tencentcloudapi.com",
            Endpoint::Audit => "cloudaudit.tencentcloudapi.com",
        }
    }

    /// Service name used in the signing scope
    pub fn service(self) -> &'static str {
        match self {
            Endpoint::ApiGateway => "apigateway",
            Endpoint::Clb => "clb",
            Endpoint::Audit => "cloudaudit",
        }
    }

    pub fn version(self) -> &'static str {
        match self {
            Endpoint::ApiGateway => "2018-08-08",
            Endpoint::Clb => "2018-03-17",
            Endpoint::Audit => "2019-03-19",
        }
    }
}

/// Executes one cloud action
///
/// Returns the content of the `Response` object. Errors reported inside the
/// envelope come back as `ApiError::Api`.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn call(
        &self,
        endpoint: Endpoint,
        action: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, ApiError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnvelopeError {
    code: String,
    message: String,
}

/// Unwrap `{"Response": {...}}`, turning an embedded `Error` into `ApiError::Api`
pub(crate) fn open_envelope(action: &str, body: &str) -> Result<serde_json::Value, ApiError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|e| {
        log::error!("{action}: unparsable response: {}", truncate_for_log(body));
        ApiError::Parse(e.to_string())
    })?;

    let Some(error) = envelope.response.get("Error") else {
        return Ok(envelope.response);
    };
    let error: EnvelopeError =
        serde_json::from_value(error.clone()).map_err(|e| ApiError::Parse(e.to_string()))?;
    let request_id = envelope
        .response
        .get("RequestId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    log::error!("{action}: {} - {}", error.code, error.message);
    Err(ApiError::Api {
        code: error.code,
        message: error.message,
        request_id,
    })
}

/// Client that signs requests with TC3-HMAC-SHA256
pub struct TencentCloudClient {
    http: reqwest::Client,
    credential: Credential,
    region: String,
    max_retries: u32,
    limiter: Arc<RateLimiter>,
}

pub struct TencentCloudClientBuilder {
    credential: Credential,
    region: String,
    max_retries: u32,
    limiter: Option<Arc<RateLimiter>>,
}

impl TencentCloudClientBuilder {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Share a limiter between clients
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn build(self) -> Result<TencentCloudClient, ApiError> {
        Ok(TencentCloudClient {
            http: create_http_client()?,
            credential: self.credential,
            region: self.region,
            max_retries: self.max_retries,
            limiter: self.limiter.unwrap_or_default(),
        })
    }
}

impl TencentCloudClient {
    pub fn builder(secret_id: impl Into<String>, secret_key: impl Into<String>) -> TencentCloudClientBuilder {
        TencentCloudClientBuilder {
            credential: Credential {
                secret_id: secret_id.into(),
                secret_key: secret_key.into(),
            },
            region: DEFAULT_REGION.to_string(),
            max_retries: 2,
            limiter: None,
        }
    }

    /// Credentials from `TENCENTCLOUD_SECRET_ID`/`TENCENTCLOUD_SECRET_KEY`.
    /// The region falls back to `TENCENTCLOUD_REGION`, then `ap-guangzhou`.
    pub fn builder_from_env(region: Option<&str>) -> Result<TencentCloudClientBuilder, ApiError> {
        let secret_id = env_var(ENV_SECRET_ID)?;
        let secret_key = env_var(ENV_SECRET_KEY)?;
        let region = match region {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => std::env::var(ENV_REGION)
                .ok()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        };
        Ok(Self::builder(secret_id, secret_key).region(region))
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn env_var(name: &str) -> Result<String, ApiError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Credentials(format!("{name} is not set")))
}

#[async_trait]
impl ApiTransport for TencentCloudClient {
    async fn call(
        &self,
        endpoint: Endpoint,
        action: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let body =
            serde_json::to_string(&payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
        log::debug!("{action} request: {}", truncate_for_log(&body));

        self.limiter.check(action).await;

        let timestamp = Utc::now().timestamp();
        let authorization =
            sign::authorization(&self.credential, endpoint, action, &body, timestamp);
        let request = self
            .http
            .post(format!("https://{}", endpoint.host()))
            .header("Content-Type", sign::CONTENT_TYPE)
            .header("Host", endpoint.host())
            .header("X-TC-Action", action)
            .header("X-TC-Version", endpoint.version())
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Region", &self.region)
            .header("Authorization", authorization)
            .body(body);

        let text = execute_with_retry(request, action, self.max_retries).await?;
        open_envelope(action, &text)
    }
}
