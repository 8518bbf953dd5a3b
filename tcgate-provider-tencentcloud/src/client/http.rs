//! HTTP plumbing: client construction, retry with backoff and log truncation

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use super::error::ApiError;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Cap for a server-provided `Retry-After`
const MAX_RETRY_AFTER_SECS: u64 = 30;
const TRUNCATE_LIMIT: usize = 256;

pub(crate) fn create_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))
}

/// Send one request and return the body text
async fn execute(request: RequestBuilder, action: &str) -> Result<String, ApiError> {
    log::debug!("POST {action}");

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    })?;

    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if status == 429 {
        log::warn!("{action}: rate limited (HTTP 429), retry_after={retry_after:?}");
        return Err(ApiError::RateLimited { retry_after });
    }
    if matches!(status, 502..=504) {
        let body = response.text().await.unwrap_or_default();
        log::warn!("{action}: server error (HTTP {status})");
        return Err(ApiError::Network(format!(
            "HTTP {status}: {}",
            truncate_for_log(&body)
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Network(format!("failed to read response body: {e}")))?;
    log::debug!("{action}: HTTP {status} {}", truncate_for_log(&body));
    Ok(body)
}

/// Send a request, retrying transport-level failures up to `max_retries` times
pub(crate) async fn execute_with_retry(
    request: RequestBuilder,
    action: &str,
    max_retries: u32,
) -> Result<String, ApiError> {
    let mut attempt = 0;
    loop {
        let Some(req) = request.try_clone() else {
            log::warn!("{action}: request body cannot be cloned, sending without retry");
            return execute(request, action).await;
        };

        match execute(req, action).await {
            Err(e) if attempt < max_retries && is_transport_retryable(&e) => {
                let delay = retry_delay(&e, attempt);
                log::warn!(
                    "{} failed (attempt {}/{}), retrying in {:.1}s: {}",
                    action,
                    attempt + 1,
                    max_retries,
                    delay.as_secs_f32(),
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn is_transport_retryable(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::Network(_) | ApiError::Timeout(_) | ApiError::RateLimited { .. }
    )
}

fn retry_delay(error: &ApiError, attempt: u32) -> Duration {
    match error {
        ApiError::RateLimited {
            retry_after: Some(secs),
        } => Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS)),
        _ => backoff_delay(attempt),
    }
}

/// 100ms, 200ms, 400ms, ... capped at 10s
fn backoff_delay(attempt: u32) -> Duration {
    let delay_ms = 100_u64.saturating_mul(1_u64 << attempt.min(20));
    Duration::from_millis(delay_ms.min(10_000))
}

/// Shorten a body for logging, keeping it on a char boundary
pub(crate) fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        return s.to_string();
    }
    let mut end = TRUNCATE_LIMIT;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated, total {} bytes]", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(3), Duration::from_millis(800));
        assert_eq!(backoff_delay(10), Duration::from_secs(10));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn retry_after_is_honored_and_capped() {
        let limited = ApiError::RateLimited {
            retry_after: Some(5),
        };
        assert_eq!(retry_delay(&limited, 0), Duration::from_secs(5));
        let limited = ApiError::RateLimited {
            retry_after: Some(600),
        };
        assert_eq!(retry_delay(&limited, 0), Duration::from_secs(30));
    }

    #[test]
    fn only_transport_errors_retry_here() {
        assert!(is_transport_retryable(&ApiError::Network("x".to_string())));
        assert!(!is_transport_retryable(&ApiError::api("InternalError", "x")));
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_for_log("short"), "short");
        let long = "é".repeat(200);
        let out = truncate_for_log(&long);
        assert!(out.ends_with("[truncated, total 400 bytes]"));
    }
}
