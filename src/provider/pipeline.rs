//! Import/read pipeline
//!
//! Starts the provider on first use, then turns an import ID into one or
//! more fully read resource states with their schemas.

use super::{ProviderConfig, ProviderLauncher, ProviderPlugin, ProviderSchema, Schema};
use crate::context::CallContext;
use crate::error::ExportError;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A read resource ready to be rendered
#[derive(Debug, Clone)]
pub struct ImportedState {
    pub type_name: String,
    pub schema: Schema,
    pub state: Value,
}

struct ProviderHandle {
    plugin: Arc<dyn ProviderPlugin>,
    schema: ProviderSchema,
}

pub struct ImportPipeline {
    launcher: Arc<dyn ProviderLauncher>,
    config: ProviderConfig,
    // Set at most once; a failed launch leaves it empty so the next call retries
    handle: OnceCell<ProviderHandle>,
}

impl ImportPipeline {
    pub fn new(launcher: Arc<dyn ProviderLauncher>, config: ProviderConfig) -> Self {
        Self {
            launcher,
            config,
            handle: OnceCell::new(),
        }
    }

    async fn provider(&self, ctx: &CallContext) -> Result<&ProviderHandle> {
        self.handle
            .get_or_try_init(|| async {
                tracing::info!(
                    "Initializing provider {} {}",
                    self.config.name,
                    self.config.version
                );
                let result: Result<ProviderHandle> = ctx
                    .run("initializing provider", async {
                        let plugin = self.launcher.launch(&self.config).await?;
                        let schema = plugin.get_schema().await?;
                        Ok::<_, anyhow::Error>(ProviderHandle { plugin, schema })
                    })
                    .await;
                result.map_err(|e| -> anyhow::Error {
                    match e.downcast::<ExportError>() {
                        Ok(init @ ExportError::ProviderInit(_)) => init.into(),
                        Ok(other) => ExportError::ProviderInit(other.to_string()).into(),
                        Err(e) => ExportError::ProviderInit(format!("{:#}", e)).into(),
                    }
                })
            })
            .await
    }

    /// Import `id` as `type_name` and read every resulting resource
    pub async fn import_and_read(
        &self,
        ctx: &CallContext,
        id: &str,
        type_name: &str,
    ) -> Result<Vec<ImportedState>> {
        let provider = self.provider(ctx).await?;

        tracing::debug!("Importing {} as {}", id, type_name);
        let imported = ctx
            .run(
                "importing resource",
                provider.plugin.import_resource_state(type_name, id),
            )
            .await?;

        let mut states = Vec::with_capacity(imported.len());
        for resource in imported {
            tracing::debug!("Reading {} for {}", resource.type_name, id);
            let state = ctx
                .run(
                    "reading resource",
                    provider.plugin.read_resource(&resource),
                )
                .await?;

            if state.is_null() {
                return Err(ExportError::NullState(id.to_string()).into());
            }

            let schema = provider
                .schema
                .resource_types
                .get(&resource.type_name)
                .cloned()
                .ok_or_else(|| ExportError::MissingSchema(resource.type_name.clone()))?;

            states.push(ImportedState {
                type_name: resource.type_name,
                schema,
                state,
            });
        }

        Ok(states)
    }
}
