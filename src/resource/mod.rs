//! Resource type layer
//!
//! Maps ARM resource IDs onto azurerm resource types. The mapping tables are
//! loaded from JSON files at compile time.
//!
//! # Architecture
//!
//! - [`registry`] - Loads the embedded mapping tables into an immutable [`Registry`]
//! - [`resolver`] - Resolves an ID (or a node, with caching) to a type name
//! - [`ignore`] - Decides which children a recursive crawl skips
//! - [`remap`] - Computes the ID handed to the provider's import call
//!
//! # Resource Definitions
//!
//! Tables are defined in JSON files under `src/resources/`:
//! - `common.json` - Resource groups, global ignore suffixes, the VM lookup
//! - `web.json`, `storage.json`, `sql.json`, `network.json`, `keyvault.json`, `compute.json`

pub mod ignore;
pub mod registry;
pub mod remap;
pub mod resolver;

pub use ignore::{IgnoreReason, IgnoreRules};
pub use registry::{Registry, ResourceType};
pub use remap::{import_id_for, ImportIdStrategy};
pub use resolver::{cached_type, ResolveStrategy, TypeResolver, RESOURCE_TYPE_METADATA_KEY};
