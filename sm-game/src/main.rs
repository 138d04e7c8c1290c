//! StreetMatch game server (sm-game)
//!
//! Serves the game page, the session API and the street images. Game data
//! (image manifest and similarity rows) loads in the background after the
//! listener is up; requests that need it wait for it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sm_common::config::ConfigResolver;
use sm_game::{build_router, sources, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sm-game
#[derive(Parser, Debug)]
#[command(name = "sm-game")]
#[command(about = "StreetMatch image pairing game server")]
#[command(version)]
struct Args {
    /// Configuration file (falls back to the user config directory)
    #[arg(short, long, env = "SM_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "SM_PORT")]
    port: Option<u16>,

    /// Directory holding the images and their manifest
    #[arg(long, env = "SM_IMAGES_DIR")]
    images_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regenerate manifest.json from the image files in the images directory
    Manifest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.load();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.images_dir {
        config.images.dir = dir;
    }

    let default_filter = format!(
        "sm_game={level},sm_common={level},tower_http=info",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting StreetMatch (sm-game) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match resolver.resolve() {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    if let Some(Command::Manifest) = args.command {
        let dir = &config.images.dir;
        let written = sources::write_manifest(dir)
            .with_context(|| format!("Failed to write manifest in {}", dir.display()))?;
        info!(
            "Wrote {} entries to {}",
            written,
            dir.join(sources::MANIFEST_FILE).display()
        );
        return Ok(());
    }

    info!("Images directory: {}", config.images.dir.display());
    info!("Similarity data: {}", config.similarity.path.display());

    let addr = format!("{}:{}", config.bind, config.port);
    let state = AppState::new(config);

    let loader = state.clone();
    tokio::spawn(async move {
        loader.reload().await;
    });
    state.spawn_session_sweeper();

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("sm-game listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
