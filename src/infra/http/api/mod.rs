pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, patch, post},
};

use crate::infra::http::HttpState;

use identity::require_identity;

/// Routes that act on behalf of a caller sit behind [`require_identity`];
/// reads of posts and post lines are anonymous.
pub fn build_api_router() -> Router<HttpState> {
    Router::new()
        .route(
            "/api/v1/posts",
            post(handlers::create_post).route_layer(from_fn(require_identity)),
        )
        .route(
            "/api/v1/posts/{post_id}",
            get(handlers::get_post)
                .merge(patch(handlers::update_post).route_layer(from_fn(require_identity))),
        )
        .route("/api/v1/users/{user_id}/posts", get(handlers::list_user_posts))
        .route(
            "/api/v1/users/{user_id}/subscribe",
            post(handlers::subscribe).route_layer(from_fn(require_identity)),
        )
        .route(
            "/api/v1/subscriptions",
            get(handlers::list_subscriptions).route_layer(from_fn(require_identity)),
        )
        .route(
            "/api/v1/subscribers",
            get(handlers::list_subscribers).route_layer(from_fn(require_identity)),
        )
        .route(
            "/api/v1/feed",
            get(handlers::feed).route_layer(from_fn(require_identity)),
        )
}
