use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{AppState, middleware::require_session};

pub mod directory;
pub mod edges;
pub mod graph;
pub mod health;
pub mod members;
pub mod projects;
pub mod tasks;
pub mod users;

pub fn router(state: AppState, cors_permissive: bool) -> Router {
    let authenticated = Router::new()
        .merge(users::router())
        .merge(directory::router())
        .merge(projects::router(&state))
        .layer(from_fn_with_state(state.clone(), require_session));

    let api = Router::new()
        .route("/health", get(health::health_check))
        .merge(authenticated);

    let cors = if cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
