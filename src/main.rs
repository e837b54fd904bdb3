use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quotagate::config::Settings;
use quotagate::context::AppContext;
use quotagate::http::HttpServer;

/// API-key rate limited resource server.
#[derive(Parser, Debug)]
#[command(name = "quotagate", version, about)]
struct Cli {
    /// Read settings from a YAML file instead of the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::from_env()?,
    };
    if let Some(listen) = cli.listen {
        settings.server.listen_addr = listen;
    }

    init_tracing(&settings.app.log_level, cli.log_format);

    info!("Starting Quotagate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        env = %settings.app.env,
        service = %settings.app.service_name,
        backend = ?settings.state.backend,
        requests_per_window = settings.rate_limit.requests_per_window,
        window_seconds = settings.rate_limit.window_seconds,
        allowed_keys = settings.rate_limit.allowed_api_keys.len(),
        "Configuration loaded"
    );

    let listen_addr = settings.server.listen_addr;
    let ctx = AppContext::from_settings(settings)?;

    let server = HttpServer::bind(listen_addr, ctx).await?;
    info!("Listening on {}", server.local_addr()?);

    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Quotagate stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
