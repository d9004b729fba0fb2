use mailsentry::bootstrap;
use mailsentry::config::Config;
use mailsentry::infrastructure::http::router::build_router;
use mailsentry::infrastructure::observability;
use mailsentry::infrastructure::persistence::Database;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing and metrics
    let _observability = observability::init(&config)?;
    tracing::info!("Configuration loaded");

    // Initialize database connection
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Run migrations
    db.run_migrations().await?;
    tracing::info!("Database migrations applied");

    let classifier = bootstrap::load_classifier(&config);
    let connector = bootstrap::build_connector(&config);
    let shutdown = CancellationToken::new();

    let app = bootstrap::build_application(db, &config, connector, classifier, shutdown.clone());

    // Start the monitor scheduler only when a model is available
    let scheduler = app.scheduler.map(|scheduler| scheduler.start(shutdown.clone()));

    // Build router
    let router = build_router(app.state);

    // Start server
    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(handle) = scheduler {
        let _ = handle.await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler only an explicit cancel stops the server.
        shutdown.cancelled().await;
        return;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
