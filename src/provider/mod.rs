//! Terraform provider access
//!
//! # Module Structure
//!
//! - [`schema`] - Resource schema types returned by `GetSchema`
//! - [`install`] - Binary cache and version-pinned release download
//! - [`process`] - go-plugin handshake and the configured provider
//! - [`tfplugin5`] - Protocol messages and the gRPC client
//! - [`cty`] - msgpack state values and provider block encoding
//! - [`pipeline`] - Lazy initialization plus the import/read sequence

pub mod cty;
pub mod install;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod tfplugin5;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

pub use pipeline::{ImportPipeline, ImportedState};
pub use schema::{ProviderSchema, Schema};

/// Provider pinned for azurerm imports
pub const DEFAULT_PROVIDER_NAME: &str = "azurerm";
pub const DEFAULT_PROVIDER_VERSION: &str = "2.38.0";
pub const DEFAULT_PROVIDER_CONFIG: &str = "features {}";

/// How to obtain and configure the provider process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: String,
    pub version: String,
    /// Provider block body, passed verbatim to `Configure`
    pub config_hcl: String,
    /// Root of the local binary cache
    pub cache_dir: PathBuf,
    /// Base URL of the HashiCorp releases mirror
    pub releases_url: String,
}

/// One resource produced by `ImportResourceState`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub type_name: String,
    /// Prior state, handed back to `ReadResource`
    pub state: Value,
    /// Provider-private data from the import
    #[serde(default)]
    pub private: Vec<u8>,
}

/// The import/read half of the provider protocol
#[async_trait]
pub trait ProviderPlugin: Send + Sync {
    async fn get_schema(&self) -> Result<ProviderSchema>;

    async fn import_resource_state(&self, type_name: &str, id: &str) -> Result<Vec<ImportedResource>>;

    /// Returns `Value::Null` when the resource no longer exists
    async fn read_resource(&self, resource: &ImportedResource) -> Result<Value>;
}

/// Installs (if needed), starts and configures a provider
#[async_trait]
pub trait ProviderLauncher: Send + Sync {
    async fn launch(&self, config: &ProviderConfig) -> Result<Arc<dyn ProviderPlugin>>;
}
