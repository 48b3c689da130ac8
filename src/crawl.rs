//! Terraform export and recursive crawl
//!
//! [`Exporter`] ties resolution, import ID remapping, the provider pipeline
//! and rendering together for one node, and walks a subtree depth-first
//! for the recursive action. Failures below the root are written inline
//! as `#Error` comments so one bad node never hides its siblings.

use crate::context::CallContext;
use crate::error::ExportError;
use crate::provider::ImportPipeline;
use crate::render::render_resource;
use crate::resource::{cached_type, import_id_for, Registry, TypeResolver};
use crate::tree::{ResourceNode, ResourceTree};
use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

/// Depth ceiling for the recursive action
pub const RECURSIVE_DEPTH: usize = 50;

/// Aggregated text of a crawl, in traversal order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOutput {
    pub text: String,
    /// Every inline error annotation, also present in `text`
    pub errors: Vec<String>,
}

impl CrawlOutput {
    fn push_terraform(&mut self, terraform: &str) {
        self.text.push('\n');
        self.text.push_str(terraform);
    }

    fn push_error(&mut self, annotation: String) {
        self.text.push('\n');
        self.text.push_str(&annotation);
        self.errors.push(annotation);
    }
}

pub struct Exporter {
    registry: Arc<Registry>,
    resolver: TypeResolver,
    pipeline: ImportPipeline,
    tree: Arc<dyn ResourceTree>,
}

impl Exporter {
    pub fn new(
        registry: Arc<Registry>,
        resolver: TypeResolver,
        pipeline: ImportPipeline,
        tree: Arc<dyn ResourceTree>,
    ) -> Self {
        Self {
            registry,
            resolver,
            pipeline,
            tree,
        }
    }

    /// Resolve (or read back) the node's type
    pub async fn resolve_node(&self, ctx: &CallContext, node: &mut ResourceNode) -> Result<Option<String>> {
        self.resolver.resolve_node(ctx, node).await
    }

    /// Terraform for a single node, one block per imported resource
    pub async fn terraform_for_node(&self, ctx: &CallContext, node: &mut ResourceNode) -> Result<String> {
        let type_name = self
            .resolve_node(ctx, node)
            .await?
            .ok_or_else(|| ExportError::NoResourceType(node.id.clone()))?;

        let import_id = import_id_for(&self.registry, &type_name, &node.id)?;
        if import_id != node.id {
            tracing::debug!("Importing {} as {}", node.id, import_id);
        }

        let states = self
            .pipeline
            .import_and_read(ctx, &import_id, &type_name)
            .await?;

        let mut text = String::new();
        for imported in &states {
            text.push_str(&render_resource(
                &imported.type_name,
                &imported.schema,
                &imported.state,
            )?);
            text.push('\n');
        }
        Ok(text)
    }

    /// Export `root` and up to `depth` levels of descendants
    pub async fn crawl(&self, ctx: &CallContext, root: &mut ResourceNode, depth: usize) -> CrawlOutput {
        let mut output = CrawlOutput::default();
        self.crawl_node(ctx, root, depth, None, &mut output).await;
        tracing::info!(
            "Crawl of {} finished with {} error(s)",
            root.id,
            output.errors.len()
        );
        output
    }

    fn crawl_node<'a>(
        &'a self,
        ctx: &'a CallContext,
        node: &'a mut ResourceNode,
        remaining_depth: usize,
        inherited_type: Option<String>,
        output: &'a mut CrawlOutput,
    ) -> BoxFuture<'a, ()> {
        async move {
            match self.terraform_for_node(ctx, node).await {
                Ok(terraform) => output.push_terraform(&terraform),
                Err(e) => {
                    tracing::warn!("Export of {} failed: {:#}", node.id, e);
                    output.push_error(format!("#Error: {:#}", e));
                }
            }

            if remaining_depth == 0 {
                return;
            }

            let mut children = match ctx
                .run("expanding node", self.tree.expand_default(ctx, node))
                .await
            {
                Ok(children) => children,
                Err(e) => {
                    let error = ExportError::Expansion {
                        id: node.id.clone(),
                        message: format!("{:#}", e),
                    };
                    tracing::warn!("{}", error);
                    output.push_error(format!("#{}", error));
                    return;
                }
            };

            // Children of an unmodelled node are filtered by the nearest typed ancestor
            let ancestor_type = cached_type(node).or(inherited_type);
            let rules = self.registry.ignore_rules();
            children.retain(|child| match rules.should_ignore(&child.id, ancestor_type.as_deref()) {
                Some(reason) => {
                    tracing::debug!("Ignoring {}: {:?}", child.id, reason);
                    false
                }
                None => true,
            });

            for child in children.iter_mut() {
                self.crawl_node(ctx, child, remaining_depth - 1, ancestor_type.clone(), output)
                    .await;
            }
        }
        .boxed()
    }
}
