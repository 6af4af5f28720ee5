//! Shared HTTP plumbing for the vendor transports: status classification
//! and transport error mapping.

use storyforge_core::ProviderError;
use tracing::warn;

const MAX_ERROR_BODY: usize = 300;

const QUOTA_MARKERS: &[&str] = &[
    "resource_exhausted",
    "insufficient_quota",
    "quota",
    "rate limit",
    "rate_limit",
];

/// Map a non-success HTTP response to a [`ProviderError`].
///
/// Some vendors report quota problems with 400/403 and a descriptive body,
/// so the body is inspected before the status code.
pub fn classify_status(status: u16, body: &str) -> ProviderError {
    let lower = body.to_lowercase();

    if status == 429 || QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        return ProviderError::QuotaExceeded(format!("HTTP {status}"));
    }
    if lower.contains("content_policy_violation") || lower.contains("content_filtered") {
        return ProviderError::ContentBlocked(format!("HTTP {status}"));
    }

    match status {
        404 => ProviderError::ModelNotFound(truncate(body)),
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => {
            warn!(status, body = %truncate(body), "Provider returned error");
            ProviderError::ApiError {
                status_code: status,
                message: truncate(body),
            }
        }
    }
}

/// Map a `reqwest` transport failure.
pub fn map_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Read the body of a failed response and classify it.
pub async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    classify_status(status, &body)
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_quota() {
        assert!(matches!(
            classify_status(429, "Too Many Requests"),
            ProviderError::QuotaExceeded(_)
        ));
    }

    #[test]
    fn quota_body_wins_over_status() {
        let body = r#"{"error":{"status":"RESOURCE_EXHAUSTED","message":"Quota exceeded"}}"#;
        assert!(matches!(
            classify_status(400, body),
            ProviderError::QuotaExceeded(_)
        ));
        assert!(matches!(
            classify_status(403, r#"{"error":{"code":"insufficient_quota"}}"#),
            ProviderError::QuotaExceeded(_)
        ));
    }

    #[test]
    fn missing_model_is_not_found() {
        assert!(matches!(
            classify_status(404, "model gpt-9 does not exist"),
            ProviderError::ModelNotFound(_)
        ));
    }

    #[test]
    fn auth_failures_are_distinct() {
        assert!(matches!(
            classify_status(401, "bad key"),
            ProviderError::AuthenticationFailed(_)
        ));
    }

    #[test]
    fn policy_violation_is_blocked() {
        assert!(matches!(
            classify_status(400, r#"{"error":{"code":"content_policy_violation"}}"#),
            ProviderError::ContentBlocked(_)
        ));
    }

    #[test]
    fn server_errors_keep_truncated_body() {
        let body = "x".repeat(1000);
        match classify_status(503, &body) {
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 503);
                assert!(message.len() < 400);
                assert!(message.ends_with("..."));
            }
            other => panic!("Expected ApiError, got: {other:?}"),
        }
    }
}
