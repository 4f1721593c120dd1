//! Classify generative API failures: not found, quota, invalid argument, permission.
//!
//! The resolver treats every failure the same way; these helpers only decide
//! which message the user sees and what gets logged.

use super::ProviderError;
use serde::Deserialize;
use std::time::Duration;

/// Coarse failure category reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    NotFound,
    QuotaExceeded,
    InvalidArgument,
    PermissionDenied,
    Unavailable,
    Other,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    status: Option<String>,
}

/// The API's `error.status` string (e.g. `RESOURCE_EXHAUSTED`), if the body carries one.
pub(crate) fn api_status(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.status)
}

fn kind_from_api_status(status: &str) -> Option<StatusKind> {
    match status {
        "NOT_FOUND" => Some(StatusKind::NotFound),
        "RESOURCE_EXHAUSTED" => Some(StatusKind::QuotaExceeded),
        "INVALID_ARGUMENT" | "FAILED_PRECONDITION" => Some(StatusKind::InvalidArgument),
        "PERMISSION_DENIED" | "UNAUTHENTICATED" => Some(StatusKind::PermissionDenied),
        "UNAVAILABLE" | "DEADLINE_EXCEEDED" | "INTERNAL" => Some(StatusKind::Unavailable),
        _ => None,
    }
}

fn kind_from_http(code: u16) -> StatusKind {
    match code {
        404 => StatusKind::NotFound,
        429 => StatusKind::QuotaExceeded,
        400 => StatusKind::InvalidArgument,
        401 | 403 => StatusKind::PermissionDenied,
        500..=599 | 408 => StatusKind::Unavailable,
        _ => StatusKind::Other,
    }
}

/// Classify an error. The API's status string wins over the HTTP code.
pub fn classify(err: &ProviderError) -> StatusKind {
    match err {
        ProviderError::Http {
            status,
            body,
            api_status: parsed,
            ..
        } => parsed
            .clone()
            .or_else(|| api_status(body))
            .as_deref()
            .and_then(kind_from_api_status)
            .unwrap_or_else(|| kind_from_http(*status)),
        ProviderError::AuthRequired(_) => StatusKind::PermissionDenied,
        ProviderError::Network(e) if e.is_timeout() || e.is_connect() => StatusKind::Unavailable,
        _ => {
            let msg = err.to_string().to_lowercase();
            if msg.contains("quota") || msg.contains("resource_exhausted") {
                StatusKind::QuotaExceeded
            } else if msg.contains("not found") || msg.contains("not_found") {
                StatusKind::NotFound
            } else {
                StatusKind::Other
            }
        }
    }
}

/// True if the error means the caller ran out of quota (429 / `RESOURCE_EXHAUSTED`).
pub fn is_quota_exceeded(err: &ProviderError) -> bool {
    if classify(err) == StatusKind::QuotaExceeded {
        return true;
    }
    // Some quota replies come back as 400/403 with the quota wording only in the body.
    matches!(err, ProviderError::Http { body, .. } if body.to_lowercase().contains("quota"))
}

/// Extract a retry delay in milliseconds from the error body or message.
///
/// Understands `Retry-After: 5` style text and the API's `"retryDelay": "17s"` field.
pub fn parse_retry_after_ms(err: &ProviderError) -> Option<u64> {
    if let ProviderError::Http {
        retry_after_ms: Some(ms),
        ..
    } = err
    {
        return Some(*ms);
    }
    retry_after_from_text(&err.to_string())
}

/// Retry delay in milliseconds from raw error text.
pub(crate) fn retry_after_from_text(msg: &str) -> Option<u64> {
    let lower = msg.to_lowercase();
    for prefix in &[
        "retry-after:",
        "retry_after:",
        "retry-after ",
        "\"retrydelay\": \"",
        "\"retrydelay\":\"",
        "retry in ",
    ] {
        if let Some(pos) = lower.find(prefix) {
            let after = &msg[pos + prefix.len()..];
            let num_str: String = after
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Ok(secs) = num_str.parse::<f64>() {
                if secs.is_finite() && secs >= 0.0 {
                    let millis = Duration::from_secs_f64(secs).as_millis();
                    if let Ok(value) = u64::try_from(millis) {
                        return Some(value);
                    }
                }
            }
        }
    }
    None
}
