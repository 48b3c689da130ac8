//! Generate Terraform configuration from live Azure resources
//!
//! A resource ID is resolved to an azurerm resource type, imported and read
//! through the azurerm provider, and rendered as HCL. The recursive action
//! repeats this over the resource's subtree.
//!
//! # Module Structure
//!
//! - [`endpoints`] - Path templates with named placeholders
//! - [`resource`] - Type registry, resolution, ignore rules and import ID remapping
//! - [`arm`] - Azure Resource Manager client
//! - [`tree`] - Resource nodes and child expansion
//! - [`provider`] - Provider process, binary cache and import/read pipeline
//! - [`render`] - HCL rendering of read states
//! - [`crawl`] - Single-node export and recursive crawl
//! - [`actions`] - The "Get Terraform" actions
//! - [`config`] - Persistent configuration

pub mod actions;
pub mod arm;
pub mod config;
pub mod context;
pub mod crawl;
pub mod endpoints;
pub mod error;
pub mod provider;
pub mod render;
pub mod resource;
pub mod tree;

/// Version injected at compile time via AZTFGEN_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("AZTFGEN_VERSION") {
    Some(v) => v,
    None => "dev",
};

pub use actions::{Action, ActionKind, ActionResponse, ActionSettings, ResponseType, TerraformActions};
pub use context::CallContext;
pub use crawl::{CrawlOutput, Exporter};
pub use error::ExportError;
pub use tree::{ResourceNode, ResourceTree};
