//! Full HTTP application: notebook API, health check, optional static files
//! and the response header policy.

use axum::{middleware, routing::get, Router};
use notebook_hub_core::storage::NotebookStore;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::api::{
    self,
    middleware::{request_id_middleware, response_policy},
};

pub fn build_router(store: Arc<NotebookStore>, static_dir: Option<&Path>) -> Router {
    let mut app = Router::new()
        .merge(api::router(store))
        .route("/health", get(|| async { "OK" }));
    if let Some(dir) = static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }
    app.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(response_policy)),
    )
}
