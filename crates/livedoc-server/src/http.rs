//! Static file router.
//!
//! Serves the output directory: exported pages, published assets and copied
//! images. There are no other routes.

use std::path::Path;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::security;

/// Create the router for the HTTP static server rooted at `root`.
pub(crate) fn router(root: &Path) -> Router {
    Router::new().fallback_service(ServeDir::new(root)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(security::csp_layer())
            .layer(security::content_type_options_layer())
            .layer(security::frame_options_layer()),
    )
}
