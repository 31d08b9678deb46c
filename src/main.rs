use std::net::SocketAddr;
use std::sync::Arc;

use payment_intents::{
    api::create_router,
    api::middleware::init_tracing,
    config::Config,
    db::repositories::{PgAttemptStore, PgOrderStore, PgPaymentStore},
    db::{create_pool, run_migrations, AttemptStore, OrderStore, PaymentStore},
    gateway::{GatewayClient, HttpGatewayClient, WebhookVerifier},
    services::{
        IntentManager, LogNotifier, NotificationDispatcher, ReconciliationSync, TransitionEngine,
        WebhookProcessor,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing();

    tracing::info!("Starting payment-intents v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    tracing::info!("Configuration loaded successfully");

    // Create database connection pool
    let db_pool = create_pool(&config.database).await?;

    tracing::info!("Database connection pool created");

    // Run migrations
    run_migrations(&db_pool).await?;

    tracing::info!("Database migrations completed");

    // Stores
    let intents: Arc<dyn PaymentStore> = Arc::new(PgPaymentStore::new((*db_pool).clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new((*db_pool).clone()));
    let attempts: Arc<dyn AttemptStore> = Arc::new(PgAttemptStore::new((*db_pool).clone()));

    // Gateway adapter and webhook verifier
    let gateway: Arc<dyn GatewayClient> = Arc::new(HttpGatewayClient::new(&config.gateway)?);
    let verifier = WebhookVerifier::new(config.webhook.secret.clone());

    // Notification side effects are dispatched off the request path
    let notifier = NotificationDispatcher::new(Arc::new(LogNotifier));

    // The one transition engine every status change funnels through
    let transition = Arc::new(TransitionEngine::new(
        intents.clone(),
        orders.clone(),
        notifier.clone(),
    ));

    let intent_manager = IntentManager::new(
        intents.clone(),
        orders.clone(),
        attempts.clone(),
        gateway.clone(),
        transition.clone(),
        notifier.clone(),
    );
    let webhook_processor =
        WebhookProcessor::new(intents.clone(), gateway.clone(), transition.clone(), verifier);
    let reconciliation = ReconciliationSync::new(intents, gateway, transition);

    tracing::info!("Payment services initialized");

    // Create application state
    let state = AppState::new(config.clone(), intent_manager, webhook_processor, reconciliation);

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Payment intent engine is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
