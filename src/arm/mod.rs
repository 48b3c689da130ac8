//! Azure Resource Manager interaction module
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer tokens from `AZURE_ACCESS_TOKEN` or the Azure CLI
//! - [`client`] - ARM client implementing [`ResourceApi`]
//! - [`http`] - HTTP utilities for REST API calls

pub mod auth;
pub mod client;
pub mod http;

use crate::context::CallContext;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;

/// Minimal ARM surface used by the resolver lookup and the tree adapter
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Issue a request for `url` (an ARM path with query, or an absolute
    /// `nextLink`) and return the raw response body
    async fn request(&self, ctx: &CallContext, method: Method, url: &str) -> Result<String>;
}
