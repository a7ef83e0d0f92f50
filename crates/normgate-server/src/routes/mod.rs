//! Route assembly.

pub mod auth;
pub mod dify;
pub mod health;
pub mod neo4j;
pub mod task_files;
pub mod task_results;
pub mod tasks;

use axum::{middleware as axum_middleware, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::middleware::{auth_middleware, logging_middleware};
use crate::state::AppState;

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the full application router. Layer order (outermost first):
/// CORS, request logging, authentication.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth::router())
        .nest("/tasks", tasks::router())
        .nest("/dify/v2", dify::router())
        .nest("/neo4j", neo4j::router())
        .merge(health::router());

    Router::new()
        .nest("/api", api)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(cors_layer())
        .with_state(state)
}
