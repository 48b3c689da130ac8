//! Provider schema types
//!
//! A trimmed-down view of a provider's resource schemas: enough to know which
//! attributes are settable and how nested blocks repeat.

use super::tfplugin5;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schemas for the provider itself and each resource type it manages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSchema {
    #[serde(default)]
    pub provider: Option<Schema>,
    #[serde(default)]
    pub resource_types: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    pub fn from_wire(response: tfplugin5::GetProviderSchemaResponse) -> Self {
        Self {
            provider: response.provider.map(Schema::from_wire),
            resource_types: response
                .resource_schemas
                .into_iter()
                .map(|(name, schema)| (name, Schema::from_wire(schema)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub block: Block,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default)]
    pub block_types: BTreeMap<String, NestedBlock>,
}

impl Schema {
    fn from_wire(schema: tfplugin5::Schema) -> Self {
        Self {
            version: schema.version,
            block: schema.block.map(Block::from_wire).unwrap_or_default(),
        }
    }
}

impl Block {
    fn from_wire(block: tfplugin5::SchemaBlock) -> Self {
        let attributes = block
            .attributes
            .into_iter()
            .map(|a| {
                let attribute = Attribute {
                    required: a.required,
                    optional: a.optional,
                    computed: a.computed,
                    sensitive: a.sensitive,
                };
                (a.name, attribute)
            })
            .collect();

        let block_types = block
            .block_types
            .into_iter()
            .filter_map(|nested| {
                let nesting = NestingMode::from_wire(nested.nesting)?;
                let block = NestedBlock {
                    nesting,
                    block: nested.block.map(Block::from_wire).unwrap_or_default(),
                    min_items: u64::try_from(nested.min_items).unwrap_or(0),
                    max_items: u64::try_from(nested.max_items).unwrap_or(0),
                };
                Some((nested.type_name, block))
            })
            .collect();

        Self {
            attributes,
            block_types,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
}

impl Attribute {
    /// Whether the attribute can be written in configuration. Computed-only
    /// attributes are read-only.
    pub fn is_settable(&self) -> bool {
        !self.computed || self.optional
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedBlock {
    pub nesting: NestingMode,
    #[serde(default)]
    pub block: Block,
    #[serde(default)]
    pub min_items: u64,
    #[serde(default)]
    pub max_items: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NestingMode {
    Single,
    Group,
    List,
    Set,
    Map,
}

impl NestingMode {
    fn from_wire(mode: i32) -> Option<Self> {
        use tfplugin5::NestingMode as Wire;
        match mode {
            m if m == Wire::Single as i32 => Some(Self::Single),
            m if m == Wire::Group as i32 => Some(Self::Group),
            m if m == Wire::List as i32 => Some(Self::List),
            m if m == Wire::Set as i32 => Some(Self::Set),
            m if m == Wire::Map as i32 => Some(Self::Map),
            _ => None,
        }
    }
}
