use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use accounts_api::api::{self, AppState};
use accounts_api::auth::BcryptHasher;
use accounts_api::config::AppConfig;
use accounts_api::domain::cache::CacheStore;
use accounts_api::infrastructure::cache::{InMemoryCacheStore, RedisCacheStore};
use accounts_api::infrastructure::repositories::PostgresUserRepository;
use accounts_api::services::UserService;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("accounts_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Database connected successfully");

    // Connect to cache
    let cache: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Connecting to Redis...");
            let store = RedisCacheStore::connect(url)
                .await
                .expect("Failed to connect to Redis");
            store.ping().await.expect("Redis did not answer PING");
            tracing::info!("Redis connected successfully");
            Arc::new(store)
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process cache");
            Arc::new(InMemoryCacheStore::new())
        }
    };

    let users = UserService::new(
        Arc::new(PostgresUserRepository::new(pool.clone())),
        cache,
        Arc::new(BcryptHasher::new(config.bcrypt_cost)),
        config.service_config(),
    );

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = api::router(AppState::new(users))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Server listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    pool.close().await;
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
