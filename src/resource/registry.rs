//! Resource Registry - Load resource type mappings from JSON
//!
//! The mapping tables (resource type templates, ignore rules, import ID
//! overrides and the VM lookup rule) are embedded JSON files compiled into the
//! binary. They are parsed once into an immutable [`Registry`] that is passed
//! explicitly to the resolver and the crawler.

use super::ignore::IgnoreRules;
use super::remap::ImportIdStrategy;
use crate::endpoints::EndpointTemplate;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/common.json"),
    include_str!("../resources/web.json"),
    include_str!("../resources/storage.json"),
    include_str!("../resources/sql.json"),
    include_str!("../resources/network.json"),
    include_str!("../resources/keyvault.json"),
    include_str!("../resources/compute.json"),
];

/// Resource type definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceTypeDef {
    pub type_name: String,
    pub template: String,
    #[serde(default)]
    pub api_version: String,
    /// How to derive the identifier handed to the provider's import call
    #[serde(default)]
    pub import_id: ImportIdStrategy,
}

/// Live-lookup rule definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct VmLookupDef {
    pub template: String,
    pub api_version: String,
    /// Path to the OS type inside the GET response body
    pub os_type_path: Vec<String>,
    /// OS type value -> resource type name
    pub os_types: BTreeMap<String, String>,
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub vm_lookup: Option<VmLookupDef>,
    #[serde(default)]
    pub resource_types: Vec<ResourceTypeDef>,
    #[serde(default)]
    pub ignore_suffixes: Vec<String>,
    #[serde(default)]
    pub ignore_rules: HashMap<String, Vec<String>>,
}

impl RegistryConfig {
    fn merge(&mut self, partial: RegistryConfig) {
        if self.vm_lookup.is_none() {
            self.vm_lookup = partial.vm_lookup;
        }
        self.resource_types.extend(partial.resource_types);
        self.ignore_suffixes.extend(partial.ignore_suffixes);
        for (type_name, rules) in partial.ignore_rules {
            self.ignore_rules.entry(type_name).or_default().extend(rules);
        }
    }
}

/// A resource type with its parsed template
#[derive(Debug, Clone)]
pub struct ResourceType {
    pub type_name: String,
    pub endpoint: EndpointTemplate,
    pub import_id: ImportIdStrategy,
}

/// The VM disambiguation rule with its parsed template
#[derive(Debug, Clone)]
pub struct VmLookup {
    pub endpoint: EndpointTemplate,
    pub os_type_path: Vec<String>,
    pub os_types: BTreeMap<String, String>,
}

/// Immutable lookup tables built once at startup
#[derive(Debug, Clone)]
pub struct Registry {
    /// Table consulted by general resolution, in file order
    resource_types: Vec<ResourceType>,
    /// Types only reachable through the VM lookup
    vm_types: Vec<ResourceType>,
    vm_lookup: Option<VmLookup>,
    ignore: IgnoreRules,
}

impl Registry {
    /// Build the registry from the embedded azurerm tables
    pub fn embedded() -> Result<Self> {
        Self::from_json_documents(RESOURCE_FILES)
    }

    /// Build a registry from one or more JSON documents, merged in order
    pub fn from_json_documents(documents: &[&str]) -> Result<Self> {
        let mut merged = RegistryConfig::default();
        for (index, content) in documents.iter().enumerate() {
            let partial: RegistryConfig = serde_json::from_str(content)
                .with_context(|| format!("Failed to parse resource document #{}", index))?;
            merged.merge(partial);
        }
        Self::from_config(merged)
    }

    pub fn from_config(config: RegistryConfig) -> Result<Self> {
        let resource_types = config
            .resource_types
            .iter()
            .map(compile_type)
            .collect::<Result<Vec<_>>>()?;

        let vm_lookup = config
            .vm_lookup
            .as_ref()
            .map(|def| -> Result<VmLookup> {
                Ok(VmLookup {
                    endpoint: EndpointTemplate::parse(&def.template, &def.api_version)?,
                    os_type_path: def.os_type_path.clone(),
                    os_types: def.os_types.clone(),
                })
            })
            .transpose()
            .context("Invalid vm_lookup template")?;

        // VM types share the lookup template and are rebuilt like any other type
        let vm_types = vm_lookup
            .iter()
            .flat_map(|lookup| {
                lookup.os_types.values().map(|type_name| ResourceType {
                    type_name: type_name.clone(),
                    endpoint: lookup.endpoint.clone(),
                    import_id: ImportIdStrategy::default(),
                })
            })
            .collect();

        let ignore = IgnoreRules::new(config.ignore_suffixes, &config.ignore_rules)?;

        Ok(Self {
            resource_types,
            vm_types,
            vm_lookup,
            ignore,
        })
    }

    /// Types consulted by template-table resolution
    pub fn resource_types(&self) -> &[ResourceType] {
        &self.resource_types
    }

    pub fn vm_lookup(&self) -> Option<&VmLookup> {
        self.vm_lookup.as_ref()
    }

    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore
    }

    /// Look up a type by name, including the lookup-only VM types
    pub fn get_type(&self, type_name: &str) -> Option<&ResourceType> {
        self.resource_types
            .iter()
            .chain(self.vm_types.iter())
            .find(|t| t.type_name == type_name)
    }
}

fn compile_type(def: &ResourceTypeDef) -> Result<ResourceType> {
    Ok(ResourceType {
        type_name: def.type_name.clone(),
        endpoint: EndpointTemplate::parse(&def.template, &def.api_version)
            .with_context(|| format!("Invalid template for {}", def.type_name))?,
        import_id: def.import_id,
    })
}
