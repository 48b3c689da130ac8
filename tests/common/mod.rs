//! Fakes shared by the crawl and action tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aztfgen::arm::ResourceApi;
use aztfgen::provider::schema::{Attribute, Block};
use aztfgen::provider::{
    ImportPipeline, ImportedResource, ProviderConfig, ProviderLauncher, ProviderPlugin,
    ProviderSchema, Schema,
};
use aztfgen::resource::{Registry, TypeResolver};
use aztfgen::{CallContext, Exporter, ResourceNode, ResourceTree};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const SUB: &str = "/subscriptions/s";
pub const RG: &str = "/subscriptions/s/resourceGroups/rg";
pub const PLAN: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Web/serverfarms/plan";
pub const SITE: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Web/sites/site";
pub const VAULT: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.KeyVault/vaults/kv";
pub const VNET: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet";
pub const ACCOUNT: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/acct";
pub const CONTAINER: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/acct/blobServices/default/containers/c";
pub const BLOB: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/acct/blobServices/default/containers/c/blob1";
pub const UNMODELLED: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Fake/widgets/w";

/// Resource API that must never be called (no VM IDs in these tests)
pub struct NoApi;

#[async_trait]
impl ResourceApi for NoApi {
    async fn request(&self, _ctx: &CallContext, _method: Method, url: &str) -> Result<String> {
        Err(anyhow!("unexpected request to {}", url))
    }
}

/// Provider that imports every ID as one resource named after its last segment
#[derive(Default)]
pub struct FakeProvider {
    pub failing_ids: HashSet<String>,
    pub imported: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing_ids: ids.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn imported(&self) -> Vec<String> {
        self.imported.lock().unwrap().clone()
    }
}

fn settable(required: bool) -> Attribute {
    Attribute {
        required,
        optional: !required,
        ..Default::default()
    }
}

#[async_trait]
impl ProviderPlugin for FakeProvider {
    async fn get_schema(&self) -> Result<ProviderSchema> {
        let mut block = Block::default();
        block.attributes.insert("name".to_string(), settable(true));
        block.attributes.insert("location".to_string(), settable(false));
        block.attributes.insert(
            "id".to_string(),
            Attribute {
                computed: true,
                ..Default::default()
            },
        );

        let mut schema = ProviderSchema::default();
        for resource_type in Registry::embedded()?.resource_types() {
            schema.resource_types.insert(
                resource_type.type_name.clone(),
                Schema {
                    version: 0,
                    block: block.clone(),
                },
            );
        }
        Ok(schema)
    }

    async fn import_resource_state(&self, type_name: &str, id: &str) -> Result<Vec<ImportedResource>> {
        self.imported.lock().unwrap().push(id.to_string());
        if self.failing_ids.contains(id) {
            return Err(anyhow!("import of {} refused", id));
        }
        let name = id.rsplit('/').next().unwrap_or_default();
        Ok(vec![ImportedResource {
            type_name: type_name.to_string(),
            state: json!({ "id": id, "name": name, "location": "westeurope" }),
            private: Vec::new(),
        }])
    }

    async fn read_resource(&self, resource: &ImportedResource) -> Result<Value> {
        Ok(resource.state.clone())
    }
}

pub struct FakeLauncher(pub Arc<FakeProvider>);

#[async_trait]
impl ProviderLauncher for FakeLauncher {
    async fn launch(&self, _config: &ProviderConfig) -> Result<Arc<dyn ProviderPlugin>> {
        Ok(self.0.clone())
    }
}

/// Tree with canned children, failing and hanging nodes
#[derive(Default)]
pub struct FakeTree {
    pub children: HashMap<String, Vec<String>>,
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
    pub expanded: Mutex<Vec<String>>,
}

impl FakeTree {
    pub fn with(mut self, parent: &str, children: &[&str]) -> Self {
        self.children.insert(
            parent.to_string(),
            children.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn hanging_on(mut self, id: &str) -> Self {
        self.hanging.insert(id.to_string());
        self
    }

    pub fn expanded(&self) -> Vec<String> {
        self.expanded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceTree for FakeTree {
    async fn expand_default(&self, _ctx: &CallContext, node: &ResourceNode) -> Result<Vec<ResourceNode>> {
        self.expanded.lock().unwrap().push(node.id.clone());
        if self.hanging.contains(&node.id) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&node.id) {
            return Err(anyhow!("API request failed: 500 Internal Server Error"));
        }
        Ok(self
            .children
            .get(&node.id)
            .map(|ids| ids.iter().map(|id| ResourceNode::child(node, id.as_str())).collect())
            .unwrap_or_default())
    }
}

pub fn provider_config() -> ProviderConfig {
    ProviderConfig {
        name: "azurerm".to_string(),
        version: "2.38.0".to_string(),
        config_hcl: "features {}".to_string(),
        cache_dir: PathBuf::from("/nonexistent"),
        releases_url: "http://127.0.0.1:9".to_string(),
    }
}

pub fn exporter(provider: Arc<FakeProvider>, tree: Arc<FakeTree>) -> Exporter {
    let registry = Arc::new(Registry::embedded().unwrap());
    Exporter::new(
        registry.clone(),
        TypeResolver::new(registry, Arc::new(NoApi)),
        ImportPipeline::new(Arc::new(FakeLauncher(provider)), provider_config()),
        tree,
    )
}
