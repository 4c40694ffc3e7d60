use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::api::{create_router, AppState};
use folio::config::Config;
use folio::db::{Database, DatabaseBackend, LibSqlBackend};
use folio::embeddings::EmbeddingGateway;
use folio::llm::LlmProvider;
use folio::services::InterestRefreshManager;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Semantic memory layer for document-reading assistants")]
struct Args {
    /// Address to bind, overriding FOLIO_HOST
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overriding FOLIO_PORT / PORT
    #[arg(long)]
    port: Option<u16>,

    /// Rebuild every owner's interest profile once at startup
    #[arg(long)]
    rebuild_interests: bool,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "folio=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Initializing database...");
    let raw_db = Database::new(&config.database).await?;
    let db: Arc<dyn DatabaseBackend> = Arc::new(LibSqlBackend::new(raw_db));

    tracing::info!("Initializing embedding provider: {}...", config.embeddings.model);
    let embeddings = match EmbeddingGateway::new(&config.embeddings) {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::warn!(error = %e, "Embedding provider unavailable - semantic features will degrade");
            EmbeddingGateway::unavailable(&e.to_string())
        }
    };

    if let Some(llm_config) = &config.llm {
        tracing::info!("Initializing LLM provider: {}...", llm_config.model);
    }
    let llm = LlmProvider::new(config.llm.as_ref());
    if !llm.is_available() {
        tracing::warn!("LLM unavailable - extraction and action translation will be disabled");
    }

    let state = AppState::new(config.clone(), db, embeddings, llm);

    let refresh = InterestRefreshManager::new(
        state.db.clone(),
        state.interests.clone(),
        config.interests.window_days,
        config.interests.refresh_interval_secs,
    );

    if args.rebuild_interests {
        let rebuilt = refresh.run_once().await?;
        tracing::info!(rebuilt, "Interest profiles rebuilt at startup");
    }

    let cancel_token = CancellationToken::new();

    if config.interests.enabled {
        tracing::info!(
            "Starting interest refresh manager... (interval={}s)",
            refresh.interval_secs()
        );
        let token = cancel_token.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::info!("Interest refresh manager shutting down...");
                        break;
                    }
                    _ = tokio::time::sleep(tokio::time::Duration::from_secs(refresh.interval_secs())) => {
                        if let Err(e) = refresh.run_once().await {
                            tracing::error!("Interest refresh error: {}", e);
                        }
                    }
                }
            }
        });
    }

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Folio starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token))
        .await?;

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received, cancelling background tasks...");
    cancel_token.cancel();
}
