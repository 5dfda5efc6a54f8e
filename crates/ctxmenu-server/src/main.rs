//! `ctxmenu-server` binary

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{value_parser, Arg, ArgAction, Command};
use ctxmenu_core::{default_backend, AppConfig, LogStore, RegistryManager, SafetyValidator};
use ctxmenu_server::{router, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn build_cli() -> Command {
    Command::new("ctxmenu-server")
        .version(ctxmenu_core::VERSION)
        .about("Serve the context menu API on a local port")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Path to ctxmenu.toml"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_parser(value_parser!(u16))
                .help("Port to listen on"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init()
    };
    if let Err(err) = result {
        eprintln!("failed to initialize logging: {err}");
    }
}

async fn wait_for_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    let mut config = AppConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("failed to load configuration")?;
    if let Some(port) = matches.get_one::<u16>("port") {
        config = config.with_port(*port);
    }
    init_tracing(&config.log_level, matches.get_flag("log-json"));

    let store = LogStore::new(config.paths());
    let manager = RegistryManager::new(
        default_backend(),
        SafetyValidator::for_current_process(),
        Arc::new(store.operation_log()),
    );
    let app = router(AppState::new(manager, store));

    let listener = tokio::net::TcpListener::bind(config.server.address())
        .await
        .context("failed to bind to address")?;
    let addr = listener.local_addr().context("failed to read bound address")?;
    if !addr.ip().is_loopback() {
        tracing::warn!(%addr, "listening on a non-loopback address");
    }

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}
