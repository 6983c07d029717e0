//! HTTP utilities for GCP REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and masks potentially sensitive patterns
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A non-success response from a Google API.
#[derive(Debug, Clone, Error)]
#[error("API request failed: {status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Build an error from a raw response body, pulling `error.message` out of
    /// the standard Google error envelope when present.
    pub fn from_body(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });

        Self { status, message }
    }
}

fn api_error(error: &anyhow::Error) -> Option<&ApiError> {
    error.chain().find_map(|e| e.downcast_ref::<ApiError>())
}

/// The remote reported that the resource does not exist
pub fn is_not_found(error: &anyhow::Error) -> bool {
    api_error(error).is_some_and(|e| e.status == StatusCode::NOT_FOUND)
}

/// The remote asked us to slow down (HTTP 429)
pub fn is_rate_limited(error: &anyhow::Error) -> bool {
    api_error(error).is_some_and(|e| e.status == StatusCode::TOO_MANY_REQUESTS)
}

/// Errors worth retrying: rate limiting, server-side failures and transport
/// problems that never produced a response.
pub fn is_transient(error: &anyhow::Error) -> bool {
    if let Some(api) = api_error(error) {
        return api.status == StatusCode::TOO_MANY_REQUESTS || api.status.is_server_error();
    }

    error
        .chain()
        .filter_map(|e| e.downcast_ref::<reqwest::Error>())
        .any(|e| e.is_timeout() || e.is_connect() || e.is_request())
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gcs-bucket/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        self.send::<T, ()>(Method::GET, url, token, None).await
    }

    /// Make a POST request to a GCP API
    pub async fn post<T, B>(&self, url: &str, token: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, url, token, Some(body)).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch<T, B>(&self, url: &str, token: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::PATCH, url, token, Some(body)).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str, token: &str) -> Result<()> {
        self.send::<Value, ()>(Method::DELETE, url, token, None)
            .await
            .map(|_| ())
    }

    async fn send<T, B>(&self, method: Method, url: &str, token: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url).bearer_auth(token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            if status == StatusCode::NOT_FOUND {
                tracing::debug!("API error: {} - {}", status, sanitize_for_log(&response_body));
            } else {
                tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            }
            return Err(ApiError::from_body(status, &response_body).into());
        }

        // Empty bodies (204 on delete) decode as null
        let text = if response_body.trim().is_empty() {
            "null"
        } else {
            response_body.as_str()
        };

        serde_json::from_str(text).context("Failed to parse response JSON")
    }
}

/// Format a GCP API error for display
/// Sanitizes error messages to avoid leaking sensitive API details
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    if let Some(api) = api_error(error) {
        return match api.status.as_u16() {
            403 => "Permission denied. Check your GCP IAM permissions.".to_string(),
            401 => {
                "Authentication failed. Run 'gcloud auth application-default login'.".to_string()
            },
            404 => "Resource not found.".to_string(),
            429 => "Rate limit exceeded. Please try again later.".to_string(),
            409 => format!("Resource conflict: {}", sanitize_for_log(&api.message)),
            400 => format!("Invalid request: {}", sanitize_for_log(&api.message)),
            500..=599 => "GCP service temporarily unavailable. Please try again.".to_string(),
            _ => "Request failed. Check your network connection and try again.".to_string(),
        };
    }

    // Truncate long error messages and remove potential sensitive data
    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(160)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.contains("500 bytes total"));
    }

    #[test]
    fn test_api_error_extracts_google_message() {
        let body = r#"{"error": {"code": 409, "message": "The requested bucket name is not available."}}"#;
        let err = ApiError::from_body(StatusCode::CONFLICT, body);
        assert_eq!(err.message, "The requested bucket name is not available.");
    }

    #[test]
    fn test_api_error_falls_back_to_reason() {
        let err = ApiError::from_body(StatusCode::NOT_FOUND, "<html>nope</html>");
        assert_eq!(err.message, "Not Found");
    }

    #[test]
    fn test_classification() {
        let not_found: anyhow::Error = ApiError::from_body(StatusCode::NOT_FOUND, "").into();
        let throttled: anyhow::Error =
            ApiError::from_body(StatusCode::TOO_MANY_REQUESTS, "").into();
        let unavailable: anyhow::Error =
            ApiError::from_body(StatusCode::SERVICE_UNAVAILABLE, "").into();
        let conflict: anyhow::Error = ApiError::from_body(StatusCode::CONFLICT, "").into();

        assert!(is_not_found(&not_found));
        assert!(!is_transient(&not_found));
        assert!(is_rate_limited(&throttled));
        assert!(is_transient(&throttled));
        assert!(is_transient(&unavailable));
        assert!(!is_rate_limited(&unavailable));
        assert!(!is_transient(&conflict));
    }

    #[test]
    fn test_classification_survives_context() {
        let err = anyhow::Error::from(ApiError::from_body(StatusCode::NOT_FOUND, ""))
            .context("Failed to get bucket");
        assert!(is_not_found(&err));
    }

    #[test]
    fn test_format_gcp_error_maps_status() {
        let err: anyhow::Error = ApiError::from_body(StatusCode::FORBIDDEN, "").into();
        assert_eq!(
            format_gcp_error(&err),
            "Permission denied. Check your GCP IAM permissions."
        );
    }
}
