//! Provider child process
//!
//! Providers are go-plugin servers. They are started with the magic cookie
//! in their environment and announce where they listen on the first stdout
//! line:
//!
//! ```text
//! 1|5|unix|/tmp/plugin123456|grpc
//! ```
//!
//! (core protocol, app protocol, network, address, transport). The client
//! then connects over gRPC and speaks tfplugin5.

use super::install;
use super::tfplugin5::{
    check_diagnostics, ConfigureRequest, DynamicValue, ImportResourceStateRequest,
    PrepareProviderConfigRequest, ProviderClient, ReadResourceRequest,
};
use super::{cty, ImportedResource, ProviderConfig, ProviderLauncher, ProviderPlugin, ProviderSchema};
use crate::error::ExportError;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tonic::transport::{Channel, Endpoint};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str = "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";
pub const CORE_PROTOCOL_VERSION: u32 = 1;
pub const APP_PROTOCOL_VERSION: u32 = 5;
/// Reported to the provider on `Configure`
pub const TERRAFORM_VERSION: &str = "0.14.11";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Unix,
}

/// Parsed go-plugin handshake line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub core_version: u32,
    pub app_version: u32,
    pub network: Network,
    pub address: String,
}

impl Handshake {
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.trim().split('|').collect();
        // A sixth field carries the server certificate when AutoMTLS is on
        let [core, app, network, address, transport, ..] = parts.as_slice() else {
            bail!("Invalid provider handshake {:?}", line.trim());
        };

        let core_version: u32 = core
            .parse()
            .with_context(|| format!("Invalid core protocol version {:?}", core))?;
        if core_version != CORE_PROTOCOL_VERSION {
            bail!("Unsupported go-plugin core protocol {}", core_version);
        }
        let app_version: u32 = app
            .parse()
            .with_context(|| format!("Invalid plugin protocol version {:?}", app))?;
        if app_version != APP_PROTOCOL_VERSION {
            bail!(
                "Provider speaks plugin protocol {} (expected {})",
                app_version,
                APP_PROTOCOL_VERSION
            );
        }
        let network = match *network {
            "tcp" => Network::Tcp,
            "unix" => Network::Unix,
            other => bail!("Unsupported provider network {:?}", other),
        };
        if *transport != "grpc" {
            bail!("Provider offered {:?} instead of grpc", transport);
        }

        Ok(Self {
            core_version,
            app_version,
            network,
            address: address.to_string(),
        })
    }

    pub async fn connect(&self) -> Result<Channel> {
        match self.network {
            Network::Tcp => Endpoint::from_shared(format!("http://{}", self.address))?
                .connect()
                .await
                .with_context(|| format!("Failed to connect to provider at {}", self.address)),
            Network::Unix => connect_unix(&self.address).await,
        }
    }
}

#[cfg(unix)]
async fn connect_unix(path: &str) -> Result<Channel> {
    use hyper_util::rt::TokioIo;
    use tokio::net::UnixStream;
    use tonic::transport::Uri;
    use tower::service_fn;

    let socket = std::path::PathBuf::from(path);
    // The URI is required by the builder but never dialled
    Endpoint::try_from("http://[::]:50051")?
        .connect_with_connector(service_fn(move |_: Uri| {
            let socket = socket.clone();
            async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(socket).await?)) }
        }))
        .await
        .with_context(|| format!("Failed to connect to provider socket {}", path))
}

#[cfg(not(unix))]
async fn connect_unix(path: &str) -> Result<Channel> {
    bail!("Unix socket {} is not supported on this platform", path)
}

/// A configured provider
pub struct ProviderProcess {
    // Held so the process is killed when the handle is dropped
    _child: Option<Child>,
    client: ProviderClient,
    schema: ProviderSchema,
}

impl ProviderProcess {
    /// Start the binary, connect to the address it announces and configure it
    pub async fn start(binary: &Path, config: &ProviderConfig) -> Result<Self> {
        tracing::info!("Starting provider {:?}", binary);

        let mut child = Command::new(binary)
            .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
            .env("PLUGIN_PROTOCOL_VERSIONS", APP_PROTOCOL_VERSION.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start provider {:?}", binary))?;

        let stdout = child.stdout.take().context("Provider stdout unavailable")?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "aztfgen::provider", "{}", line);
                }
            });
        }

        let mut stdout = BufReader::new(stdout).lines();
        let line = stdout
            .next_line()
            .await
            .context("Failed to read provider handshake")?
            .ok_or_else(|| anyhow!("Provider exited before the handshake"))?;
        let handshake = Handshake::parse(&line)?;
        tracing::debug!("Provider handshake: {:?}", handshake);

        // Keep the pipe drained so the provider never blocks on a full stdout
        tokio::spawn(async move {
            while let Ok(Some(line)) = stdout.next_line().await {
                tracing::trace!(target: "aztfgen::provider", "stdout: {}", line);
            }
        });

        let channel = handshake.connect().await?;
        let mut process = Self::configure(channel, config).await?;
        process._child = Some(child);
        Ok(process)
    }

    /// Fetch the schema over an established channel and configure the provider
    pub async fn configure(channel: Channel, config: &ProviderConfig) -> Result<Self> {
        let client = ProviderClient::new(channel);

        let response = client.get_schema().await.context("GetSchema failed")?;
        check_diagnostics("GetSchema", &response.diagnostics)?;
        let schema = ProviderSchema::from_wire(response);
        tracing::debug!(
            "Provider schema has {} resource types",
            schema.resource_types.len()
        );

        let provider_block = schema.provider.clone().unwrap_or_default().block;
        let config_value = cty::provider_config_value(&provider_block, &config.config_hcl)?;
        let config_value = DynamicValue {
            msgpack: cty::encode(&config_value)?,
            json: Vec::new(),
        };

        let prepared = client
            .prepare_provider_config(PrepareProviderConfigRequest {
                config: Some(config_value.clone()),
            })
            .await
            .context("PrepareProviderConfig failed")?;
        check_diagnostics("PrepareProviderConfig", &prepared.diagnostics)?;
        let config_value = prepared
            .prepared_config
            .filter(|prepared| !prepared.msgpack.is_empty())
            .unwrap_or(config_value);

        let configured = client
            .configure(ConfigureRequest {
                terraform_version: TERRAFORM_VERSION.to_string(),
                config: Some(config_value),
            })
            .await
            .context("Configure failed")?;
        check_diagnostics("Configure", &configured.diagnostics)?;

        Ok(Self {
            _child: None,
            client,
            schema,
        })
    }
}

#[async_trait]
impl ProviderPlugin for ProviderProcess {
    async fn get_schema(&self) -> Result<ProviderSchema> {
        Ok(self.schema.clone())
    }

    async fn import_resource_state(&self, type_name: &str, id: &str) -> Result<Vec<ImportedResource>> {
        let response = self
            .client
            .import_resource_state(ImportResourceStateRequest {
                type_name: type_name.to_string(),
                id: id.to_string(),
            })
            .await
            .context("ImportResourceState failed")?;
        check_diagnostics("ImportResourceState", &response.diagnostics)?;

        response
            .imported_resources
            .into_iter()
            .map(|resource| {
                let state = match &resource.state {
                    Some(state) => cty::decode(&state.msgpack)?,
                    None => Value::Null,
                };
                Ok(ImportedResource {
                    type_name: resource.type_name,
                    state,
                    private: resource.private,
                })
            })
            .collect()
    }

    async fn read_resource(&self, resource: &ImportedResource) -> Result<Value> {
        let response = self
            .client
            .read_resource(ReadResourceRequest {
                type_name: resource.type_name.clone(),
                current_state: Some(DynamicValue {
                    msgpack: cty::encode(&resource.state)?,
                    json: Vec::new(),
                }),
                private: resource.private.clone(),
            })
            .await
            .context("ReadResource failed")?;
        check_diagnostics("ReadResource", &response.diagnostics)?;

        match response.new_state {
            Some(state) => cty::decode(&state.msgpack),
            None => Ok(Value::Null),
        }
    }
}

/// Launches the cached (or freshly downloaded) provider binary
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

#[async_trait]
impl ProviderLauncher for ProcessLauncher {
    async fn launch(&self, config: &ProviderConfig) -> Result<Arc<dyn ProviderPlugin>> {
        let binary = install::ensure_binary(config).await?;
        let process = ProviderProcess::start(&binary, config)
            .await
            .map_err(|e| ExportError::ProviderInit(format!("{:#}", e)))?;
        Ok(Arc::new(process))
    }
}
