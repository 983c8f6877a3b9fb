//! HTTP failure classification shared by the provider adapters.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::ports::TransportError;

/// Maps a reqwest send/receive failure to a transport error.
pub(crate) fn from_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::timeout(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        TransportError::connection(format!("Connection failed: {}", err))
    } else if err.is_decode() {
        TransportError::malformed(format!("Failed to decode response: {}", err))
    } else {
        TransportError::connection(err.to_string())
    }
}

/// Seconds from a numeric `Retry-After` header.
pub(crate) fn retry_after_header(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok())
}

/// Seconds from a "try again in Ns" phrase in an error message.
pub(crate) fn retry_after_from_message(message: &str) -> Option<u32> {
    let idx = message.find("try again in ")?;
    let digits: String = message[idx + "try again in ".len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<String>,
}

/// Provider error message and structured code, when the body carries them.
///
/// String codes win over the textual `status` field; numeric codes only echo
/// the HTTP status and are ignored.
pub(crate) fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = match envelope.error.code {
                Some(serde_json::Value::String(code)) => Some(code),
                _ => envelope.error.status,
            };
            (envelope.error.message, code)
        }
        Err(_) => (None, None),
    }
}

/// Classifies a non-success HTTP response.
pub(crate) fn from_status(status: StatusCode, headers: &HeaderMap, body: &str) -> TransportError {
    let (message, code) = parse_error_body(body);
    let message = message.unwrap_or_else(|| body.chars().take(500).collect());

    match status.as_u16() {
        401 | 403 => TransportError::unauthorized(format!("Provider rejected credentials ({})", status)),
        429 => {
            let hint = retry_after_header(headers).or_else(|| retry_after_from_message(&message));
            TransportError::rate_limited(hint, message)
        }
        400..=499 => TransportError::bad_request(code, message),
        500..=599 => TransportError::server_error(status.as_u16(), message),
        _ => TransportError::malformed(format!("Unexpected status {}: {}", status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::TransportErrorKind;
    use reqwest::header::HeaderValue;

    fn headers_with_retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn unauthorized_hides_body() {
        let err = from_status(StatusCode::UNAUTHORIZED, &HeaderMap::new(), "secret detail");
        assert_eq!(err.kind, TransportErrorKind::Unauthorized);
        assert!(!err.message.contains("secret detail"));
    }

    #[test]
    fn forbidden_is_unauthorized() {
        let err = from_status(StatusCode::FORBIDDEN, &HeaderMap::new(), "");
        assert_eq!(err.kind, TransportErrorKind::Unauthorized);
    }

    #[test]
    fn rate_limit_prefers_header() {
        let body = r#"{"error":{"message":"Please try again in 20s."}}"#;
        let err = from_status(StatusCode::TOO_MANY_REQUESTS, &headers_with_retry_after("7"), body);
        assert_eq!(
            err.kind,
            TransportErrorKind::RateLimited {
                retry_after_secs: Some(7)
            }
        );
    }

    #[test]
    fn rate_limit_falls_back_to_message() {
        let body = r#"{"error":{"message":"Rate limit reached. Please try again in 20s."}}"#;
        let err = from_status(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), body);
        assert_eq!(
            err.kind,
            TransportErrorKind::RateLimited {
                retry_after_secs: Some(20)
            }
        );
    }

    #[test]
    fn rate_limit_without_hint() {
        let err = from_status(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), "slow down");
        assert_eq!(
            err.kind,
            TransportErrorKind::RateLimited {
                retry_after_secs: None
            }
        );
    }

    #[test]
    fn bad_request_carries_string_code() {
        let body = r#"{"error":{"message":"too long","code":"context_length_exceeded"}}"#;
        let err = from_status(StatusCode::BAD_REQUEST, &HeaderMap::new(), body);
        assert!(err.indicates_context_overflow());
    }

    #[test]
    fn numeric_code_falls_back_to_status_field() {
        let body = r#"{"error":{"code":400,"message":"bad","status":"INVALID_ARGUMENT"}}"#;
        let (_, code) = parse_error_body(body);
        assert_eq!(code.as_deref(), Some("INVALID_ARGUMENT"));
    }

    #[test]
    fn server_errors_keep_status() {
        let err = from_status(StatusCode::SERVICE_UNAVAILABLE, &HeaderMap::new(), "down");
        assert_eq!(err.kind, TransportErrorKind::ServerError { status: 503 });
    }
}
