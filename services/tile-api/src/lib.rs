//! SkyView tile service library.
//!
//! Exposes the router and pipeline so the server binary, the command-line
//! fetcher and the integration tests share one implementation.

pub mod config;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod proxy;
pub mod state;
pub mod upstream;

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use state::AppState;

/// Build the HTTP router for `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let web_dir = state.config.web.dir.clone();
    let app_files = ServeDir::new(&web_dir).fallback(ServeFile::new(web_dir.join("index.html")));
    let aladin_files = ServeDir::new(&state.config.web.aladin_dir);

    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/tile", get(handlers::tile_handler))
        // Health and monitoring
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/favicon.ico", get(handlers::favicon_handler))
        .route("/proxy", get(handlers::proxy_handler))
        .route("/proxy/", get(handlers::proxy_handler))
        // Static front-end
        .nest_service("/app", app_files)
        .nest_service("/aladin", aladin_files)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
