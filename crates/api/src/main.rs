use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixshop_api::config::ServerConfig;
use pixshop_api::router::build_app_router;
use pixshop_api::state::AppState;
use pixshop_api::background;
use pixshop_core::provider::ProviderId;
use pixshop_pipeline::gate::UsageGate;
use pixshop_pipeline::ledger::CreditLedger;
use pixshop_pipeline::store::{PgUsageStore, UsageStore};
use pixshop_pipeline::Orchestrator;
use pixshop_providers::api::TaskApi;
use pixshop_providers::backend::{GeminiBackend, GenerationBackend, GptImageBackend, NanoBackend};
use pixshop_providers::task::{JobClient, TaskTransport};
use pixshop_store::{AssetStore, S3AssetStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixshop_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = pixshop_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    pixshop_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    pixshop_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Temporary asset store ---
    let asset_store: Arc<dyn AssetStore> =
        Arc::new(S3AssetStore::new(config.s3.clone(), pool.clone()).await);
    tracing::info!(bucket = %config.s3.bucket, "Temporary asset store ready");

    // --- Usage store ---
    let usage_store: Arc<dyn UsageStore> = Arc::new(PgUsageStore::new(pool.clone()));

    // --- Provider pipelines ---
    let orchestrators = build_orchestrators(&config, &asset_store, &usage_store);
    tracing::info!(providers = orchestrators.len(), "Provider pipelines wired");

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        orchestrators: Arc::new(orchestrators),
    };

    // --- Background sweep ---
    let sweep_cancel = tokio_util::sync::CancellationToken::new();
    let sweep_handle = tokio::spawn(background::asset_sweep::run(
        pool.clone(),
        Arc::clone(&asset_store),
        sweep_cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweep_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweep_handle).await;
    tracing::info!("Temporary asset sweep stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wire one orchestrator per configured provider.
///
/// The two task providers share a single gateway client; the synchronous
/// provider gets its own HTTP client.
fn build_orchestrators(
    config: &ServerConfig,
    asset_store: &Arc<dyn AssetStore>,
    usage_store: &Arc<dyn UsageStore>,
) -> HashMap<ProviderId, Arc<Orchestrator>> {
    let gateway: Arc<dyn TaskTransport> = Arc::new(TaskApi::new(
        config.providers.task_gateway_url.clone(),
        config.providers.task_gateway_key.clone(),
    ));

    let mut orchestrators = HashMap::new();

    for id in [ProviderId::Nano, ProviderId::GptImage, ProviderId::Gemini] {
        let profile = config.profile_for(id);

        let backend: Arc<dyn GenerationBackend> = match id {
            ProviderId::Nano => Arc::new(NanoBackend::new(JobClient::new(
                Arc::clone(&gateway),
                profile.poll_interval,
                profile.max_poll_attempts,
            ))),
            ProviderId::GptImage => Arc::new(GptImageBackend::new(JobClient::new(
                Arc::clone(&gateway),
                profile.poll_interval,
                profile.max_poll_attempts,
            ))),
            ProviderId::Gemini => Arc::new(GeminiBackend::new(
                config.providers.gemini_base_url.clone(),
                config.providers.gemini_api_key.clone(),
            )),
        };

        orchestrators.insert(
            id,
            Arc::new(Orchestrator::new(
                profile,
                backend,
                Arc::clone(asset_store),
                Arc::clone(usage_store),
                UsageGate::new(config.anonymous_quota, config.signup_grant),
                CreditLedger::new(config.anonymous_quota),
            )),
        );
    }

    orchestrators
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
