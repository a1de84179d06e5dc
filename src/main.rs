use std::sync::Arc;

use movie_night_api::{
    config::Config,
    create_router,
    db::{connect_redis, create_pool, run_migrations, Cache, PgStore},
    routes::cors_layer,
    services::{AuthSettings, ChatCompletion, GroqClient, TmdbProvider},
    AppState,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("movie_night_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database ready");

    let (cache, cache_handle) = match config.redis_url.as_deref() {
        Some(url) => {
            let (cache, handle) = Cache::new(connect_redis(url).await?);
            tracing::info!("TMDB response cache enabled");
            (Some(cache), Some(handle))
        }
        None => (None, None),
    };

    let movies = TmdbProvider::new(
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        cache,
    );

    let llm: Option<Arc<dyn ChatCompletion>> = match config.groq_api_key.clone() {
        Some(key) if !key.is_empty() => Some(Arc::new(GroqClient::new(
            key,
            config.groq_api_url.clone(),
            config.llm_model.clone(),
        ))),
        _ => {
            tracing::warn!("GROQ_API_KEY not set, AI endpoints are disabled");
            None
        }
    };
    if config.admin_password.is_none() {
        tracing::warn!("ADMIN_PASSWORD not set, admin routes will fail");
    }

    let state = Arc::new(AppState::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(movies),
        llm,
        AuthSettings::new(config.jwt_secret.clone(), config.bcrypt_cost),
        config.admin_password.clone(),
    ));

    let app = create_router(state).layer(cors_layer(&config.frontend_url)?);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, frontend = %config.frontend_url, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
    tracing::info!("Shutdown signal received");
}
