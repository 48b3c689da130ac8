//! Azure Authentication
//!
//! Tokens come from `AZURE_ACCESS_TOKEN` when set, otherwise from
//! `az account get-access-token`.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::RwLock;

/// Environment variable holding a pre-fetched ARM bearer token
pub const TOKEN_ENV_VAR: &str = "AZURE_ACCESS_TOKEN";

/// Audience requested from the Azure CLI
pub const ARM_RESOURCE: &str = "https://management.azure.com/";

/// Refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// TTL used when the CLI output has no usable expiry
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
enum TokenSource {
    Static(String),
    AzureCli,
}

/// ARM credentials holder with token caching
#[derive(Clone)]
pub struct ArmCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Output of `az account get-access-token --output json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Local time, e.g. `2026-10-19 14:03:12.000000`
    #[serde(default)]
    expires_on: Option<String>,
    /// Unix timestamp (newer CLI versions)
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

impl ArmCredentials {
    /// Credentials from the environment, falling back to the Azure CLI
    pub fn from_env() -> Self {
        match std::env::var(TOKEN_ENV_VAR) {
            Ok(token) if !token.trim().is_empty() => {
                tracing::debug!("Using ARM token from {}", TOKEN_ENV_VAR);
                Self::from_token(token.trim())
            }
            _ => Self {
                source: TokenSource::AzureCli,
                token_cache: Arc::new(RwLock::new(None)),
            },
        }
    }

    /// Credentials for a fixed token (never refreshed)
    pub fn from_token(token: &str) -> Self {
        Self {
            source: TokenSource::Static(token.to_string()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(token.clone());
        }

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let (token, ttl) = fetch_cli_token().await?;
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        tracing::debug!("New token cached, expires in ~{} minutes", ttl.as_secs() / 60);
        Ok(token)
    }
}

async fn fetch_cli_token() -> Result<(String, Duration)> {
    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            ARM_RESOURCE,
            "--output",
            "json",
        ])
        .output()
        .await
        .context("Failed to run 'az'. Install the Azure CLI or set AZURE_ACCESS_TOKEN")?;

    if !output.status.success() {
        bail!(
            "'az account get-access-token' failed ({}). Run 'az login'",
            output.status
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_cli_token(&stdout, Utc::now())
}

/// Parse the CLI's JSON output into a token and its remaining lifetime
fn parse_cli_token(json: &str, now: DateTime<Utc>) -> Result<(String, Duration)> {
    let parsed: CliToken =
        serde_json::from_str(json).context("Failed to parse Azure CLI token output")?;

    let expires = match (parsed.expires_on_epoch, parsed.expires_on.as_deref()) {
        (Some(epoch), _) => DateTime::<Utc>::from_timestamp(epoch, 0),
        (None, Some(local)) => NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|naive| naive.and_local_timezone(Local).single())
            .map(|dt| dt.with_timezone(&Utc)),
        (None, None) => None,
    };

    let ttl = expires
        .and_then(|e| (e - now).to_std().ok())
        .unwrap_or(DEFAULT_TOKEN_TTL);

    Ok((parsed.access_token, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_token_with_epoch() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let json = r#"{"accessToken": "abc", "expires_on": 1700000600, "tokenType": "Bearer"}"#;
        let (token, ttl) = parse_cli_token(json, now).unwrap();
        assert_eq!(token, "abc");
        assert_eq!(ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_parse_cli_token_without_expiry_uses_default() {
        let json = r#"{"accessToken": "abc"}"#;
        let (_, ttl) = parse_cli_token(json, Utc::now()).unwrap();
        assert_eq!(ttl, DEFAULT_TOKEN_TTL);
    }

    #[test]
    fn test_parse_cli_token_with_local_time() {
        let json = r#"{"accessToken": "abc", "expiresOn": "2099-01-01 00:00:00.000000"}"#;
        let (_, ttl) = parse_cli_token(json, Utc::now()).unwrap();
        assert!(ttl > DEFAULT_TOKEN_TTL);
    }

    #[test]
    fn test_parse_cli_token_rejects_garbage() {
        assert!(parse_cli_token("not json", Utc::now()).is_err());
    }

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let credentials = ArmCredentials::from_token("fixed");
        assert_eq!(credentials.get_token().await.unwrap(), "fixed");
    }
}
