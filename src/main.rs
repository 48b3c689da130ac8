use anyhow::{Context, Result};
use aztfgen::arm::auth::ArmCredentials;
use aztfgen::arm::client::ArmClient;
use aztfgen::arm::http::format_arm_error;
use aztfgen::arm::ResourceApi;
use aztfgen::config::Config;
use aztfgen::provider::process::ProcessLauncher;
use aztfgen::provider::ImportPipeline;
use aztfgen::resource::{Registry, TypeResolver};
use aztfgen::tree::ArmTree;
use aztfgen::{ActionKind, ActionSettings, Exporter, ResourceNode, TerraformActions};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Generate Terraform configuration from a live Azure resource
#[derive(Parser, Debug)]
#[command(name = "aztfgen", version = aztfgen::VERSION, about, long_about = None)]
struct Args {
    /// ARM resource ID, e.g. /subscriptions/<id>/resourceGroups/<name>
    resource_id: String,

    /// Also export every descendant of the resource
    #[arg(short, long)]
    recursive: bool,

    /// Maximum recursion depth
    #[arg(long)]
    depth: Option<usize>,

    /// Deadline for the action, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Only list the actions available for the resource
    #[arg(long)]
    list_actions: bool,

    /// Write the output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// azurerm provider version to use
    #[arg(long)]
    provider_version: Option<String>,

    /// Provider binary cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {:?}", parent))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("aztfgen {} started with log level: {:?}", aztfgen::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("aztfgen").join("aztfgen.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".aztfgen").join("aztfgen.log");
    }
    PathBuf::from("aztfgen.log")
}

fn build_actions(args: &Args, config: &Config) -> Result<TerraformActions> {
    let registry = Arc::new(Registry::embedded()?);

    let endpoint = config.effective_endpoint();
    tracing::info!("Using ARM endpoint {}", endpoint);
    let api: Arc<dyn ResourceApi> = Arc::new(ArmClient::new(&endpoint, ArmCredentials::from_env())?);

    let provider = config.provider_config(args.provider_version.as_deref(), args.cache_dir.as_deref());
    tracing::info!(
        "Using provider {} {} from {:?}",
        provider.name,
        provider.version,
        provider.cache_dir
    );

    let exporter = Exporter::new(
        registry.clone(),
        TypeResolver::new(registry, api.clone()),
        ImportPipeline::new(Arc::new(ProcessLauncher), provider),
        Arc::new(ArmTree::new(api)?),
    );

    let mut settings = ActionSettings {
        action_timeout: config.effective_action_timeout(),
        recursive_timeout: config.effective_recursive_timeout(),
        recursive_depth: args.depth.unwrap_or_else(|| config.effective_recursive_depth()),
    };
    if let Some(secs) = args.timeout {
        if args.recursive {
            settings.recursive_timeout = Duration::from_secs(secs);
        } else {
            settings.action_timeout = Duration::from_secs(secs);
        }
    }

    Ok(TerraformActions::new(exporter, settings))
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();
    let actions = build_actions(&args, &config)?;
    let mut node = ResourceNode::new(args.resource_id.trim());

    if args.list_actions {
        let available = actions.list_actions(&mut node).await?;
        if available.is_empty() {
            println!("No actions available for {}", node.id);
        }
        for action in available {
            println!("{}", action.display_name);
        }
        return Ok(());
    }

    let kind = if args.recursive {
        ActionKind::GetTerraformRecursive
    } else {
        ActionKind::GetTerraform
    };
    let response = actions.execute(&mut node, kind).await?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &response.response)
                .with_context(|| format!("Failed to write {:?}", path))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", response.response),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_arm_error(&err));
        std::process::exit(1);
    }

    Ok(())
}
