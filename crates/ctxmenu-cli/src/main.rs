//! `ctxmenu` binary

use ctxmenu_cli::{build_cli, dispatch, exit_code, resolve_config, Context, EXIT_FAILURE};
use ctxmenu_core::{default_backend, LogStore, RegistryManager, SafetyValidator};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

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

fn main() -> ExitCode {
    let matches = build_cli().get_matches();

    let config = match resolve_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    init_tracing(&config.log_level, matches.get_flag("log-json"));

    let store = LogStore::new(config.paths());
    let manager = RegistryManager::new(
        default_backend(),
        SafetyValidator::for_current_process(),
        Arc::new(store.operation_log()),
    );
    tracing::debug!(log_file = %store.paths().log_file.display(), "operation log ready");
    let ctx = Context { manager, store };

    let mut stdout = io::stdout().lock();
    let outcome = dispatch(&ctx, &matches, &mut stdout);
    if let Err(err) = stdout.flush() {
        tracing::warn!(error = %err, "failed to flush stdout");
    }
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}
