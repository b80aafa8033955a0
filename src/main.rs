use std::sync::Arc;

use async_trait::async_trait;
use cas_sso::{
    cas::{
        BoxError, CallbackRequest, CasStrategy, LogoutCallbackResult, SingleSignOutHandler,
        logout::{NAME_ID_PARAM, SESSION_INDEX_PARAM},
    },
    config::{AppConfig, CasConfig},
    observability::init_tracing,
    routes::{AppState, router},
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "CAS single-sign-on client", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "cas-sso.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the server (default)
    Serve,
    /// Load and validate the configuration file, then exit
    CheckConfig,
}

/// Acknowledges Single Sign-Out notifications. There are no local sessions to
/// end, so the notification is only logged.
struct LogSignOut;

#[async_trait]
impl SingleSignOutHandler for LogSignOut {
    async fn on_single_sign_out(
        &self,
        request: &CallbackRequest,
        _options: &CasConfig,
    ) -> Result<Option<LogoutCallbackResult>, BoxError> {
        tracing::info!(
            name_id = request.param(NAME_ID_PARAM).unwrap_or_default(),
            "CAS single sign-out received"
        );
        tracing::debug!(
            session_index = request.param(SESSION_INDEX_PARAM).unwrap_or_default(),
            "Single sign-out session"
        );
        Ok(None)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match args.command {
        Some(Command::CheckConfig) => {
            println!("Configuration OK: {}", args.config);
        }
        Some(Command::Serve) | None => run_server(config).await,
    }
}

async fn run_server(config: AppConfig) {
    if let Err(e) = init_tracing(&config.observability) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let strategy = match CasStrategy::new(config.cas.clone()) {
        Ok(strategy) => strategy.with_single_sign_out(Arc::new(LogSignOut)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to configure CAS client");
            std::process::exit(1);
        }
    };

    let callback_url = config.server.callback_url();
    let app = router(AppState::new(strategy, config.server.clone()));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    tracing::info!(callback_url = %callback_url, "Server listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
