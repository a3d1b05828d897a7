mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use alerts::AlertMonitor;
use common::{MarketDataSource, Result};
use strategy::AnalysisConfig;

pub use error::ApiError;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<AlertMonitor>,
    pub market: Arc<dyn MarketDataSource>,
    /// Fallbacks for analysis parameters a request leaves out.
    pub analysis: Arc<AnalysisConfig>,
}

/// All routes with permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::analysis_router())
        .merge(routes::alerts_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Bind and run the HTTP API until the server stops.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
