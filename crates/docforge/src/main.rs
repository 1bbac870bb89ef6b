use anyhow::Result;
use clap::{Parser, ValueEnum};
use ephemeral_workspace::Workspace;
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docforge::{
    compression::SizeTargetedCompressor,
    config::{Config, defaults::DEFAULT_CONFIG_FILE},
    engine::{CompressionEngine, GhostscriptEngine},
    web::{AppState, WebServer},
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "docforge")]
#[command(version)]
#[command(about = "Document processing server with expiring download links")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Workspace root (overrides config file)
    #[arg(long, value_name = "DIR")]
    workspace_root: Option<PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn init_tracing(level: &str, format: LogFormat) {
    let log_filter = format!("docforge={level},ephemeral_workspace={level}");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let mut config = Config::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(root) = cli.workspace_root {
        config.workspace.root = root;
    }
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("Starting docforge v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {:?}", cli.config);

    let policy = config.workspace.retention_policy();
    let workspace = Workspace::builder()
        .root(config.workspace.root.clone())
        .retention(policy)
        .build()
        .await?;
    info!("Workspace root: {:?}", workspace.root());
    let sweeper = workspace.sweeper();
    info!(
        "Artifacts expire after {}, swept every {}",
        humantime::format_duration(policy.retention),
        humantime::format_duration(sweeper.interval())
    );
    let sweeper = sweeper.spawn();

    let ghostscript = GhostscriptEngine::from_config(&config.engine);
    if !ghostscript.probe().await {
        tracing::warn!(
            "'{}' could not be started; compression requests will fail until it is installed",
            ghostscript.command()
        );
    }
    let engine: Arc<dyn CompressionEngine> = Arc::new(ghostscript);
    let search = SizeTargetedCompressor::from_config(workspace.clone(), engine.clone(), &config.compression)?;
    info!("Quality ladder (dpi): {:?}", search.ladder().levels());

    let state = AppState {
        config: Arc::new(config),
        workspace,
        engine,
        search: Arc::new(search),
    };
    let web_server = WebServer::new(state)?;
    info!("Starting web server on {}", web_server.addr());

    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_cancellation(server_ready_tx, None).await {
            tracing::error!("Web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => info!("Web server is now listening"),
        Ok(Err(bind_error)) => {
            tracing::error!("Failed to bind web server: {}", bind_error);
            sweeper.shutdown().await;
            return Err(bind_error);
        }
        Err(_) => {
            sweeper.shutdown().await;
            return Err(anyhow::anyhow!("Web server task completed without signaling"));
        }
    }

    if let Err(e) = server_handle.await {
        tracing::error!("Web server task panicked: {}", e);
    }

    sweeper.shutdown().await;
    info!("docforge stopped");
    Ok(())
}
