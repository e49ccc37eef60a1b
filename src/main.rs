//! School Portal - account and student-request backend
//! Mission: Serve the portal API with durable, race-free account state

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use school_portal::{
    api::{create_router, login_limiter, AppState},
    config::Config,
    notify::{Notifier, OutboxNotifier, WebhookNotifier},
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "school-portal")]
#[command(about = "School portal backend: accounts, marks and student requests")]
struct Args {
    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Data directory (overrides DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Storage backend: json, sqlite or memory (overrides STORAGE_BACKEND)
    #[arg(long)]
    storage: Option<String>,

    /// Credential relay URL
    #[arg(long, env = "NOTIFY_WEBHOOK_URL")]
    notify_webhook_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(storage) = args.storage.as_deref() {
        config.storage = storage.parse()?;
    }
    if let Some(url) = args.notify_webhook_url.filter(|u| !u.trim().is_empty()) {
        config.notify_webhook_url = Some(url);
    }

    info!("🏫 School portal starting");

    let notifier: Arc<dyn Notifier> = match config.notify_webhook_url.clone() {
        Some(url) => {
            info!("📧 Credentials delivered via webhook {}", url);
            Arc::new(WebhookNotifier::new(url)?)
        }
        None => {
            let outbox = OutboxNotifier::new(&config.data_dir)?;
            info!(
                "📧 No NOTIFY_WEBHOOK_URL set, credentials go to outbox {}",
                outbox.path().display()
            );
            Arc::new(outbox)
        }
    };

    let state = AppState::open(&config, notifier)?;
    let limiter = login_limiter(&config);

    // Expired login windows
    let sweeper = limiter.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(300));
        loop {
            tick.tick().await;
            sweeper.cleanup();
        }
    });

    let app = create_router(state, limiter);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Initialize tracing; RUST_LOG overrides the default filter
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "school_portal=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also the crate's own .env when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
