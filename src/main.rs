//! # Castline: WhatsApp broadcast controller
//!
//! Accepts commands from authorized operators (WhatsApp messages or the HTTP
//! control surface) and broadcasts announcements to every known customer
//! with progressive delivery delays.
//!
//! Usage:
//!   castline                          # ~/.castline/config.toml or $CASTLINE_CONFIG
//!   castline --config ./castline.toml # Explicit config file
//!   castline --port 8080 -v           # Custom port, debug logging

use anyhow::{Context, Result};
use castline_channels::{HttpDirectory, Session, WhatsAppGateway};
use castline_commands::{CommandRouter, CommandSyntax, HandlerRegistry, Services};
use castline_core::traits::RecipientDirectory;
use castline_core::{CastlineConfig, Shutdown};
use castline_gateway::AppState;
use castline_scheduler::{BroadcastDispatcher, DispatchPolicy, RecipientRegistry};
use castline_security::Allowlist;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "castline",
    version,
    about = "📣 Castline: authorization-gated WhatsApp broadcast controller"
)]
struct Cli {
    /// Config file (defaults to $CASTLINE_CONFIG, then ~/.castline/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port, overrides config and $PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<CastlineConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("CASTLINE_CONFIG").map(PathBuf::from));
    let mut config = match path {
        Some(path) => CastlineConfig::load_from(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CastlineConfig::load()?,
    };
    config.apply_env()?;
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    Ok(config)
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "castline=debug,tower_http=debug"
    } else {
        "castline=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(&cli)?;
    let allowlist = Allowlist::from_config(&config)?;
    if allowlist.is_empty() {
        tracing::warn!("⚠️ No authorized operators configured, commands will be refused");
    }
    tracing::info!("🔐 {} authorized operator(s)", allowlist.len());

    let registry =
        RecipientRegistry::open(&config.registry.expanded_path(), config.numbering.clone()).await;

    let session = Arc::new(Session::new(
        Box::new(WhatsAppGateway::new(config.whatsapp.clone())),
        Duration::from_millis(config.dispatch.delivery_timeout_ms),
    ));

    let directory = HttpDirectory::from_config(&config.directory)
        .map(|d| Arc::new(d) as Arc<dyn RecipientDirectory>);
    if directory.is_none() {
        tracing::warn!("⚠️ No customer directory configured, broadcasts use the registry only");
    }

    let shutdown = Shutdown::new();
    let services = Arc::new(Services {
        session: session.clone(),
        registry: Arc::new(registry),
        allowlist: Arc::new(allowlist),
        directory,
        dispatcher: Arc::new(BroadcastDispatcher::new(
            DispatchPolicy::from(&config.dispatch),
            shutdown.clone(),
        )),
        numbering: config.numbering.clone(),
        syntax: CommandSyntax::from(&config.commands),
        broadcast_prefix: config.commands.broadcast_prefix.clone(),
        directory_timeout: Duration::from_millis(config.directory.timeout_ms),
    });
    let commands = Arc::new(CommandRouter::new(
        HandlerRegistry::with_defaults(&config.commands),
        services,
    ));

    if let Err(e) = session.connect().await {
        tracing::error!("❌ WhatsApp session unavailable, sends will fail until it recovers: {e}");
    }

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let state = AppState {
        commands,
        api_key: config.gateway.api_key.clone(),
        webhook_verify_token: config.whatsapp.webhook_verify_token.clone(),
        app_secret: config.whatsapp.app_secret.clone(),
        start_time: std::time::Instant::now(),
    };
    if state.app_secret.is_empty() {
        tracing::warn!("⚠️ No WhatsApp app secret configured, inbound webhooks will be refused");
    }
    if state.api_key.is_none() {
        tracing::warn!("⚠️ No API key configured, the control surface is open");
    }

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    castline_gateway::serve(state, &addr, shutdown).await?;

    session.close().await?;
    tracing::info!("👋 Castline stopped");
    Ok(())
}
