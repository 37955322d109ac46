use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use access_service::config::load_access_config;
use access_service::store::PgStore;
use access_service::{build_router, AppState};
use anyhow::{anyhow, Context};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use common_auth::{JwtConfig, JwtVerifier};
use common_cache::{CacheBackend, InMemoryCacheBackend, ListingCache, RedisCacheBackend};
use common_observability::AccessMetrics;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_access_config()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run access-service migrations")?;
    }

    let backend: Arc<dyn CacheBackend> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisCacheBackend::connect(url, config.cache_key_prefix.clone())
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            warn!("REDIS_URL not set; listing cache is process-local");
            Arc::new(InMemoryCacheBackend::new())
        }
    };
    let cache = ListingCache::new(backend).with_ttl(config.cache_ttl);

    let jwt_config = JwtConfig::new(config.jwt_issuer.clone(), config.jwt_audience.clone())
        .with_leeway(config.jwt_leeway_seconds);
    let jwt_verifier = JwtVerifier::new(jwt_config)
        .with_rsa_pem(config.jwt_key_id.clone(), config.jwt_public_key_pem.as_bytes())
        .map_err(|err| anyhow!("failed to load JWT_PUBLIC_KEY_PEM: {err}"))?;

    let metrics = Arc::new(AccessMetrics::new().context("Failed to register metrics")?);
    let state = AppState::from_store(Arc::new(PgStore::new(pool)), cache, Arc::new(jwt_verifier), metrics);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config
                .cors_allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION, HeaderName::from_static("x-trace-id")]);

    let app = build_router(state).layer(cors);

    let ip: IpAddr = config.host.parse().context("Invalid HOST")?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting access-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
