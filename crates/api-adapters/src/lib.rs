//! # api-adapters
//!
//! The axum HTTP surface of Give. Handlers parse requests, call a service
//! and map its result onto a JSON response; no business rule lives here.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

pub use error::ApiError;
pub use metrics::ApiMetrics;
pub use state::AppState;

/// Builds the full application router with middleware applied.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/polls/{post_id}/vote", post(handlers::votes::cast_vote))
        .route("/posts/{post_id}/vote", post(handlers::votes::cast_vote))
        .route(
            "/posts",
            post(handlers::posts::create_post).get(handlers::posts::list_posts),
        )
        .route("/posts/{post_id}", get(handlers::posts::get_post))
        .route(
            "/posts/{post_id}/comments",
            get(handlers::comments::list_comments).post(handlers::comments::create_comment),
        )
        .route(
            "/groups",
            post(handlers::groups::create_group).get(handlers::groups::list_groups),
        )
        .route("/groups/join", post(handlers::groups::join_group))
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::health::metrics))
        .with_state(state);

    middleware::apply(routes)
}
