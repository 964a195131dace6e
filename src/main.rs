use social_messenger::{
    create_router,
    db::{create_pool, run_migrations},
    storage::Stores,
    AppState, Config, StorageBackend,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,social_messenger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let stores = match (config.storage_backend, config.database_url.as_deref()) {
        (StorageBackend::Postgres, Some(database_url)) => {
            // Sanitize URL for logging (hide password)
            let url_for_logging = database_url
                .rsplit('@')
                .next()
                .map(|host| format!("<hidden>@{}", host))
                .unwrap_or_else(|| "<invalid format>".to_string());

            tracing::info!("Connecting to database at {}...", url_for_logging);
            let db = create_pool(database_url).await?;

            tracing::info!("Running migrations...");
            run_migrations(&db).await?;

            Stores::postgres(db)
        }
        _ => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Stores::memory()
        }
    };

    let addr = format!("{}:{}", config.host, config.port);

    // Create application state and router
    let state = AppState::new(config, stores);
    let app = create_router(state);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
