//! Import ID remapping
//!
//! The azurerm provider expects import IDs with its own casing, and a few
//! types are imported by a data-plane URL rather than the ARM ID.

use super::registry::Registry;
use crate::endpoints::{EndpointTemplate, MatchValues};
use crate::error::ExportError;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportIdStrategy {
    /// Rebuild the ID from the template so casing matches the provider
    #[default]
    Rebuild,
    /// `https://{accountName}.blob.core.windows.net/{containerName}`
    BlobContainerUrl,
}

impl ImportIdStrategy {
    pub fn import_id(&self, endpoint: &EndpointTemplate, values: &MatchValues) -> Result<String> {
        match self {
            ImportIdStrategy::Rebuild => endpoint.build(values),
            ImportIdStrategy::BlobContainerUrl => {
                let account = required(values, "accountName")?;
                let container = required(values, "containerName")?;
                Ok(format!("https://{}.blob.core.windows.net/{}", account, container))
            }
        }
    }
}

fn required<'a>(values: &'a MatchValues, name: &str) -> Result<&'a str> {
    values.get(name).map(String::as_str).ok_or_else(|| {
        ExportError::MissingMatchValue {
            name: name.to_string(),
        }
        .into()
    })
}

/// Compute the ID to pass to the provider's import call for a resolved node
pub fn import_id_for(registry: &Registry, type_name: &str, id: &str) -> Result<String> {
    let resource_type = registry
        .get_type(type_name)
        .ok_or_else(|| ExportError::UnknownResourceType(type_name.to_string()))?;

    let result = resource_type.endpoint.matches(id);
    if !result.is_match {
        return Err(ExportError::TemplateMismatch {
            type_name: type_name.to_string(),
            id: id.to_string(),
        }
        .into());
    }

    resource_type
        .import_id
        .import_id(&resource_type.endpoint, &result.values)
}
