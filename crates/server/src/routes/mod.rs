use axum::{middleware::from_fn_with_state, routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;

use crate::{middleware::require_token, AppState};

mod auth;
mod keywords;
mod tasks;

pub fn router(state: AppState) -> Router {
    let public = Router::<AppState>::new()
        .route("/health", get(health))
        .route("/login", post(auth::login));

    let protected = Router::<AppState>::new()
        .route("/logout", post(auth::logout))
        .route("/user", get(auth::current_user))
        .merge(tasks::router(&state))
        .merge(keywords::router(&state))
        .layer(from_fn_with_state(state.clone(), require_token));

    Router::<AppState>::new()
        .merge(public)
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
