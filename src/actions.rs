//! User-facing actions
//!
//! Two actions are offered on a node: "Get Terraform" and "Get Terraform
//! (recursive)". They are only listed for nodes whose ID resolves to a
//! known resource type.

use crate::context::CallContext;
use crate::crawl::{Exporter, RECURSIVE_DEPTH};
use crate::tree::ResourceNode;
use anyhow::Result;
use std::fmt;
use std::time::Duration;
use tracing::Instrument;

pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RECURSIVE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    GetTerraform,
    GetTerraformRecursive,
}

impl ActionKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ActionKind::GetTerraform => "Get Terraform",
            ActionKind::GetTerraformRecursive => "Get Terraform (recursive)",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An action offered for a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub display_name: &'static str,
}

impl From<ActionKind> for Action {
    fn from(kind: ActionKind) -> Self {
        Self {
            kind,
            display_name: kind.display_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Terraform,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub response_type: ResponseType,
    pub response: String,
}

/// Deadlines and depth used when running actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSettings {
    /// Deadline for listing and for the single-node action
    pub action_timeout: Duration,
    pub recursive_timeout: Duration,
    pub recursive_depth: usize,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            action_timeout: DEFAULT_ACTION_TIMEOUT,
            recursive_timeout: DEFAULT_RECURSIVE_TIMEOUT,
            recursive_depth: RECURSIVE_DEPTH,
        }
    }
}

pub struct TerraformActions {
    exporter: Exporter,
    settings: ActionSettings,
}

impl TerraformActions {
    pub fn new(exporter: Exporter, settings: ActionSettings) -> Self {
        Self { exporter, settings }
    }

    pub fn settings(&self) -> &ActionSettings {
        &self.settings
    }

    /// Actions available for `node`; empty when its ID doesn't resolve.
    /// The resolved type is cached on the node.
    pub async fn list_actions(&self, node: &mut ResourceNode) -> Result<Vec<Action>> {
        let ctx = CallContext::with_timeout(self.settings.action_timeout);
        let resolved = self.exporter.resolve_node(&ctx, node).await?;

        Ok(match resolved {
            Some(_) => vec![
                ActionKind::GetTerraform.into(),
                ActionKind::GetTerraformRecursive.into(),
            ],
            None => Vec::new(),
        })
    }

    /// Run an action on `node`
    pub async fn execute(&self, node: &mut ResourceNode, kind: ActionKind) -> Result<ActionResponse> {
        let timeout = match kind {
            ActionKind::GetTerraform => self.settings.action_timeout,
            ActionKind::GetTerraformRecursive => self.settings.recursive_timeout,
        };
        let ctx = CallContext::with_timeout(timeout);
        let span = tracing::info_span!(
            "action",
            action = %kind,
            id = %node.id,
            correlation_id = %ctx.correlation_id(),
        );

        async {
            tracing::info!("Running {:?} on {}", kind, node.id);
            let response = match kind {
                ActionKind::GetTerraform => self.exporter.terraform_for_node(&ctx, node).await?,
                ActionKind::GetTerraformRecursive => {
                    self.exporter
                        .crawl(&ctx, node, self.settings.recursive_depth)
                        .await
                        .text
                }
            };
            tracing::info!("{} produced {} bytes", kind, response.len());

            Ok::<_, anyhow::Error>(ActionResponse {
                response_type: ResponseType::Terraform,
                response,
            })
        }
        .instrument(span)
        .await
    }
}
