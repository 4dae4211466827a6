use anyhow::Result;
use axum::http::HeaderValue;
use server::{Deployment, routes};
use services::services::config::Config;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    let addr = config.bind_addr();
    let cors = cors_layer(&config);
    let deployment = Deployment::new(config).await?;

    let app = routes::router(&deployment)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(deployment);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("SEO PM API listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Pin CORS to the configured origin when one is set, stay permissive otherwise.
fn cors_layer(config: &Config) -> CorsLayer {
    let Some(origin) = config.server.cors_origin.as_deref() else {
        return CorsLayer::permissive();
    };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!(origin, "invalid cors_origin, falling back to permissive CORS");
            CorsLayer::permissive()
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received, stopping server");
}
