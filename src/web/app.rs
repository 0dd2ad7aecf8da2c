use super::{ImageDirs, handlers};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

pub fn create_app(dirs: ImageDirs) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api", get(handlers::home))
        .route("/api/images", get(handlers::resize_image))
        // Add CORS layer for broader client compatibility
        .layer(CorsLayer::permissive())
        // Add tracing for HTTP requests and responses
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        .with_state(Arc::new(dirs))
}
