mod routes;
mod session;
mod settings;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;
use crate::state::AppState;

const DEFAULT_LOG_FILTER: &str = "info,one_core=debug";

#[derive(Parser)]
#[command(name = "one-server")]
#[command(about = "Serve the One calendar mirror, event mutations and assistant tools over HTTP")]
struct Cli {
    /// Config file (defaults to ~/.config/one/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:4096
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref(), cli.bind)?;
    let state = AppState::new(&settings)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    info!(
        addr = %settings.bind,
        database = %settings.database_path().display(),
        "one-server listening"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
