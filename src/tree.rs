//! Resource tree
//!
//! Nodes are owned by whoever implements [`ResourceTree`]; the exporter only
//! reads their IDs and writes its resolved type into the metadata map.
//! [`ArmTree`] is the default expansion used by the command line.

use crate::arm::client::with_api_version;
use crate::arm::ResourceApi;
use crate::context::CallContext;
use crate::endpoints::EndpointTemplate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A node in the resource tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn child(parent: &ResourceNode, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent.id.clone()),
            metadata: HashMap::new(),
        }
    }
}

/// Child discovery for resource nodes
#[async_trait]
pub trait ResourceTree: Send + Sync {
    /// Immediate children of `node` using the generic expansion only, so no
    /// type-specific expander side effects are triggered
    async fn expand_default(&self, ctx: &CallContext, node: &ResourceNode) -> Result<Vec<ResourceNode>>;
}

/// One child listing: children of IDs matching `parent` are listed by
/// appending `suffix` to the parent ID
struct ChildListing {
    parent: EndpointTemplate,
    suffix: &'static str,
    api_version: &'static str,
}

const LISTINGS: &[(&str, &str, &str)] = &[
    ("/subscriptions/{subscriptionId}", "/resourceGroups", "2021-04-01"),
    (
        "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}",
        "/resources",
        "2021-04-01",
    ),
    (
        "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.Storage/storageAccounts/{accountName}",
        "/blobServices/default/containers",
        "2019-06-01",
    ),
    (
        "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.Sql/servers/{serverName}",
        "/databases",
        "2021-02-01-preview",
    ),
    (
        "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.Network/virtualNetworks/{virtualNetworkName}",
        "/subnets",
        "2020-06-01",
    ),
    (
        "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers/Microsoft.Network/networkSecurityGroups/{networkSecurityGroupName}",
        "/securityRules",
        "2020-06-01",
    ),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    value: Vec<ListItem>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    id: String,
}

/// Default expansion backed by ARM list calls
pub struct ArmTree {
    api: Arc<dyn ResourceApi>,
    listings: Vec<ChildListing>,
}

impl ArmTree {
    pub fn new(api: Arc<dyn ResourceApi>) -> Result<Self> {
        let listings = LISTINGS
            .iter()
            .map(|&(parent, suffix, api_version)| -> Result<ChildListing> {
                Ok(ChildListing {
                    parent: EndpointTemplate::parse(parent, api_version)?,
                    suffix,
                    api_version,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { api, listings })
    }

    /// The list URL for a node's children, if the node kind has any
    fn list_url(&self, id: &str) -> Option<String> {
        let path = id.split('?').next().unwrap_or_default().trim_end_matches('/');
        self.listings
            .iter()
            .find(|l| l.parent.matches(path).is_match)
            .map(|l| with_api_version(&format!("{}{}", path, l.suffix), l.api_version))
    }
}

#[async_trait]
impl ResourceTree for ArmTree {
    async fn expand_default(&self, ctx: &CallContext, node: &ResourceNode) -> Result<Vec<ResourceNode>> {
        let Some(mut url) = self.list_url(&node.id) else {
            tracing::debug!("No child listing for {}", node.id);
            return Ok(Vec::new());
        };

        let mut children = Vec::new();
        loop {
            let body = self.api.request(ctx, Method::GET, &url).await?;
            let page: ListPage = serde_json::from_str(&body)
                .with_context(|| format!("Failed to parse child listing for {}", node.id))?;

            children.extend(page.value.into_iter().map(|item| ResourceNode::child(node, item.id)));

            match page.next_link {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }

        tracing::debug!("Expanded {} into {} children", node.id, children.len());
        Ok(children)
    }
}
