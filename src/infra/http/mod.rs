//! HTTP boundary: routing, identity extraction, request validation and
//! status mapping over the [`Microblog`] core.

pub mod api;
mod middleware;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, middleware as axum_middleware};

use crate::application::error::ErrorReport;
use crate::application::microblog::Microblog;
use crate::infra::backend::Backend;

use middleware::{log_responses, set_request_context};

const GREETING: &str = "Welcome to the microblog!";
const READY: &str = "Ready to work!";

#[derive(Clone)]
pub struct HttpState {
    pub microblog: Microblog,
    pub backend: Backend,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(greeting))
        .route("/maintenance/ping", get(ping))
        .merge(api::build_api_router())
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn greeting() -> &'static str {
    GREETING
}

async fn ping(State(state): State<HttpState>) -> Response {
    match state.backend.health_check().await {
        Ok(()) => (StatusCode::OK, READY).into_response(),
        Err(err) => {
            let mut response = (StatusCode::SERVICE_UNAVAILABLE, "Not ready yet").into_response();
            ErrorReport::from_error(
                "infra::http::ping",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
