//! Resource type resolution
//!
//! Resolution runs a list of strategies in order and takes the first answer.
//! The VM strategy asks ARM for the OS type; the table strategy matches the
//! ID against the registry's templates.

use super::registry::{Registry, VmLookup};
use crate::arm::client::with_api_version;
use crate::arm::ResourceApi;
use crate::context::CallContext;
use crate::error::ExportError;
use crate::tree::ResourceNode;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Metadata key holding the resolved type on a node. An empty value means
/// resolution ran and found nothing.
pub const RESOURCE_TYPE_METADATA_KEY: &str = "aztfgen.resource_type_name";

#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    /// `Ok(None)` passes the ID on to the next strategy
    async fn resolve(&self, ctx: &CallContext, id: &str) -> Result<Option<String>>;
}

/// Disambiguates VMs by reading `osType` from the live resource
pub struct VmLookupStrategy {
    lookup: VmLookup,
    api: Arc<dyn ResourceApi>,
}

impl VmLookupStrategy {
    pub fn new(lookup: VmLookup, api: Arc<dyn ResourceApi>) -> Self {
        Self { lookup, api }
    }
}

#[async_trait]
impl ResolveStrategy for VmLookupStrategy {
    async fn resolve(&self, ctx: &CallContext, id: &str) -> Result<Option<String>> {
        if !self.lookup.endpoint.matches(id).is_match {
            return Ok(None);
        }

        let url = with_api_version(id, &self.lookup.endpoint.api_version);
        let body = ctx
            .run("looking up virtual machine", self.api.request(ctx, Method::GET, &url))
            .await
            .map_err(|e| -> anyhow::Error {
                if matches!(
                    e.downcast_ref::<ExportError>(),
                    Some(ExportError::DeadlineExceeded(_))
                ) {
                    return e;
                }
                ExportError::LookupTransport {
                    id: id.to_string(),
                    message: format!("{:#}", e),
                }
                .into()
            })?;

        let os_type = os_type_from_body(&body, &self.lookup.os_type_path).map_err(|message| {
            ExportError::MalformedLookupResponse {
                id: id.to_string(),
                message,
            }
        })?;

        match os_type.and_then(|os| self.lookup.os_types.get(&os)) {
            Some(type_name) => Ok(Some(type_name.clone())),
            None => {
                tracing::debug!("No usable OS type for {}, falling back to table", id);
                Ok(None)
            }
        }
    }
}

/// Walk `path` through the response body. A body that isn't a JSON object
/// is an error; a missing or non-string value is `None`.
fn os_type_from_body(body: &str, path: &[String]) -> std::result::Result<Option<String>, String> {
    let json: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if !json.is_object() {
        return Err("expected a JSON object".to_string());
    }

    let value = path.iter().try_fold(&json, |current, key| current.get(key));
    Ok(value.and_then(Value::as_str).map(str::to_string))
}

/// Matches the ID against the registry's template table
pub struct TemplateTableStrategy {
    registry: Arc<Registry>,
}

impl TemplateTableStrategy {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ResolveStrategy for TemplateTableStrategy {
    async fn resolve(&self, _ctx: &CallContext, id: &str) -> Result<Option<String>> {
        Ok(self
            .registry
            .resource_types()
            .iter()
            .find(|t| t.endpoint.matches(id).is_match)
            .map(|t| t.type_name.clone()))
    }
}

/// Resolves IDs to resource type names
pub struct TypeResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl TypeResolver {
    /// The VM lookup (when the registry has one) followed by the table
    pub fn new(registry: Arc<Registry>, api: Arc<dyn ResourceApi>) -> Self {
        let mut strategies: Vec<Box<dyn ResolveStrategy>> = Vec::new();
        if let Some(lookup) = registry.vm_lookup() {
            strategies.push(Box::new(VmLookupStrategy::new(lookup.clone(), api)));
        }
        strategies.push(Box::new(TemplateTableStrategy::new(registry)));
        Self { strategies }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Resolve an ID, ignoring any node cache
    pub async fn resolve_id(&self, ctx: &CallContext, id: &str) -> Result<Option<String>> {
        for strategy in &self.strategies {
            if let Some(type_name) = strategy.resolve(ctx, id).await? {
                return Ok(Some(type_name));
            }
        }
        Ok(None)
    }

    /// Resolve a node, reading and filling its metadata cache
    pub async fn resolve_node(&self, ctx: &CallContext, node: &mut ResourceNode) -> Result<Option<String>> {
        if let Some(cached) = node.metadata.get(RESOURCE_TYPE_METADATA_KEY) {
            return Ok(non_empty(cached));
        }

        let resolved = self.resolve_id(ctx, &node.id).await?;
        tracing::debug!("Resolved {} to {:?}", node.id, resolved);
        node.metadata.insert(
            RESOURCE_TYPE_METADATA_KEY.to_string(),
            resolved.clone().unwrap_or_default(),
        );
        Ok(resolved)
    }
}

/// The type cached on a node, if resolution ran and found one
pub fn cached_type(node: &ResourceNode) -> Option<String> {
    node.metadata
        .get(RESOURCE_TYPE_METADATA_KEY)
        .and_then(|t| non_empty(t))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
