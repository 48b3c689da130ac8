//! ARM Client
//!
//! Combines authentication and HTTP functionality behind [`ResourceApi`].

use super::auth::ArmCredentials;
use super::http::ArmHttpClient;
use super::ResourceApi;
use crate::context::CallContext;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use url::Url;

/// Public cloud ARM endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Main ARM client
#[derive(Clone)]
pub struct ArmClient {
    pub credentials: ArmCredentials,
    pub http: ArmHttpClient,
    endpoint: Url,
}

impl ArmClient {
    pub fn new(endpoint: &str, credentials: ArmCredentials) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid ARM endpoint {:?}", endpoint))?;
        Ok(Self {
            credentials,
            http: ArmHttpClient::new()?,
            endpoint,
        })
    }

    /// Resolve a resource path (or absolute `nextLink`) to a full URL
    pub fn resolve_url(&self, url: &str) -> Result<Url> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Url::parse(url).with_context(|| format!("Invalid URL {:?}", url));
        }
        self.endpoint
            .join(url)
            .with_context(|| format!("Invalid resource path {:?}", url))
    }
}

#[async_trait]
impl ResourceApi for ArmClient {
    async fn request(&self, ctx: &CallContext, method: Method, url: &str) -> Result<String> {
        let url = self.resolve_url(url)?;
        let token = self.credentials.get_token().await?;
        self.http
            .send(method, url.as_str(), &token, ctx.correlation_id())
            .await
    }
}

/// Append `api-version` to a resource path
pub fn with_api_version(path: &str, api_version: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!(
        "{}{}api-version={}",
        path,
        separator,
        urlencoding::encode(api_version)
    )
}
