use mail_dispatch::{
    config,
    executor::TaskExecutor,
    handler::AppState,
    queue::Broker,
    router,
    service::EmailService,
    transport::{ImapStore, SmtpMailer},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Log setup
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mail_dispatch=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let cfg = config::load_config().unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {e}");
        panic!("failed to load config: {e}");
    });
    tracing::info!("Successfully loaded mail dispatch config");
    tracing::debug!("Config: {:?}", cfg);

    // Worker pool and queue
    let executor = TaskExecutor::new(&cfg.executor);
    let broker = Arc::new(Broker::new(cfg.queue.capacity));
    broker.declare(&cfg.queue.name);

    // Setup service
    let service = Arc::new(EmailService::new(
        cfg.mail.username.clone(),
        Arc::new(SmtpMailer::new(&cfg.mail)),
        Arc::new(ImapStore::new(&cfg.mail)),
        executor,
    ));

    let _consumer = service
        .register_consumer(&broker, &cfg.queue.name)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to register queue consumer: {e}");
            panic!("failed to register queue consumer: {e}");
        });

    let state = Arc::new(AppState {
        service,
        broker,
        queue: cfg.queue.name.clone(),
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", cfg.port))
        .await
        .expect("Failed to bind to address");
    let addr = listener
        .local_addr()
        .expect("Failed to read listener address");

    tracing::info!("Mail dispatch service starting, listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    tracing::info!("Mail dispatch service stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
