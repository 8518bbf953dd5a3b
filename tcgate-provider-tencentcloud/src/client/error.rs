//! Tencent Cloud API error type

use tcgate_core::poll::Retryable;
use tcgate_core::provider::ProviderError;
use thiserror::Error;

/// Code prefixes that signal a transient failure on the cloud side
const RETRYABLE_CODE_PREFIXES: &[&str] = &[
    "InternalError",
    "RequestLimitExceeded",
    "ResourceUnavailable",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Error reported inside the response envelope
    #[error("[TencentCloudSDKError] Code={code}, Message={message}, RequestId={request_id}")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited (HTTP 429), retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    /// The call succeeded but the expected payload is missing
    #[error("{action}: SDK returned empty response")]
    EmptyResponse { action: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("failed to serialize request: {0}")]
    Serialization(String),

    #[error("missing credentials: {0}")]
    Credentials(String),

    /// The cloud answered but reported the operation as not done
    #[error("{0}")]
    Operation(String),
}

impl ApiError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            request_id: String::new(),
        }
    }

    pub fn empty_response(action: &str) -> Self {
        Self::EmptyResponse {
            action: action.to_string(),
        }
    }

    /// Error code for envelope errors
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the error means the entity does not exist
    pub fn is_not_found(&self) -> bool {
        self.code().is_some_and(|code| {
            code.starts_with("ResourceNotFound")
                || (code.starts_with("InvalidParameterValue") && code.contains("NotExist"))
        })
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) | ApiError::RateLimited { .. } => true,
            ApiError::Api { code, .. } => RETRYABLE_CODE_PREFIXES
                .iter()
                .any(|prefix| code.starts_with(prefix)),
            _ => false,
        }
    }
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        ProviderError::from_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_are_retryable() {
        assert!(ApiError::api("InternalError", "oops").is_retryable());
        assert!(ApiError::api("InternalError.DbError", "oops").is_retryable());
        assert!(ApiError::api("RequestLimitExceeded", "slow down").is_retryable());
        assert!(ApiError::api("ResourceUnavailable.Busy", "busy").is_retryable());
        assert!(ApiError::Network("reset".to_string()).is_retryable());
        assert!(ApiError::RateLimited { retry_after: None }.is_retryable());

        assert!(!ApiError::api("InvalidParameter", "bad").is_retryable());
        assert!(!ApiError::empty_response("CreateApi").is_retryable());
        assert!(!ApiError::Operation("delete api fail".to_string()).is_retryable());
    }

    #[test]
    fn not_found_codes() {
        assert!(ApiError::api("ResourceNotFound.InvalidUsagePlan", "").is_not_found());
        assert!(ApiError::api("ResourceNotFound.InvalidApi", "").is_not_found());
        assert!(ApiError::api("InvalidParameterValue.ServiceNotExist", "").is_not_found());
        assert!(!ApiError::api("InvalidParameterValue.InvalidRegion", "").is_not_found());
        assert!(!ApiError::Network("x".to_string()).is_not_found());
    }

    #[test]
    fn empty_response_message() {
        assert_eq!(
            ApiError::empty_response("CreateApi").to_string(),
            "CreateApi: SDK returned empty response"
        );
    }
}
