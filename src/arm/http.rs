//! HTTP utilities for ARM REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and drops control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// ARM answered with a non-success status
#[derive(Debug, Error)]
#[error("API request failed: {status}")]
pub struct ApiError {
    pub status: StatusCode,
}

/// HTTP client wrapper for ARM calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("aztfgen/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send a request and return the body text of a successful response
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        correlation_id: Uuid,
    ) -> Result<String> {
        tracing::debug!("{} {}", method, url);

        let response = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("x-ms-correlation-request-id", correlation_id.to_string())
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only log sanitized/truncated error body
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ApiError { status }.into());
        }

        Ok(body)
    }
}

/// Remediation hint for an ARM status anywhere in the error chain
pub fn error_hint(error: &anyhow::Error) -> Option<&'static str> {
    let api_error = error.chain().find_map(|e| e.downcast_ref::<ApiError>())?;
    match api_error.status {
        StatusCode::FORBIDDEN => Some("Permission denied. Check your Azure RBAC role assignments."),
        StatusCode::UNAUTHORIZED => Some("Authentication failed. Run 'az login' or set AZURE_ACCESS_TOKEN."),
        StatusCode::NOT_FOUND => Some("Resource not found."),
        StatusCode::TOO_MANY_REQUESTS => Some("Rate limit exceeded. Please try again later."),
        _ => None,
    }
}

/// Format an error for display: the full chain, then a hint when ARM refused the call
pub fn format_arm_error(error: &anyhow::Error) -> String {
    let message = format!("{:#}", error);
    match error_hint(error) {
        Some(hint) => format!("{}\n{}", message, hint),
        None => message,
    }
}
