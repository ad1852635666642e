use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::domain::types::UserId;

const TARGET: &str = "microblog::http::response";

#[derive(Clone)]
pub struct RequestId(pub String);

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = RequestId(Uuid::new_v4().to_string());
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(request_id);
    response
}

/// Logs every 4xx/5xx response with the error chain the handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let failure = Failure {
        method,
        path,
        request_id,
        elapsed_ms: start.elapsed().as_millis(),
        // Identity is resolved inside the router, so it is read back from the response.
        user: response
            .extensions()
            .get::<UserId>()
            .map(UserId::to_string)
            .unwrap_or_default(),
        report: response.extensions_mut().remove::<ErrorReport>(),
    };
    if status.is_server_error() {
        failure.log_error(status.as_u16());
    } else {
        failure.log_warn(status.as_u16());
    }
    response
}

struct Failure {
    method: Method,
    path: String,
    request_id: String,
    elapsed_ms: u128,
    user: String,
    report: Option<ErrorReport>,
}

impl Failure {
    fn source(&self) -> &'static str {
        self.report.as_ref().map_or("unknown", |report| report.source)
    }

    fn chain(&self) -> &[String] {
        match &self.report {
            Some(report) => &report.messages,
            None => &[],
        }
    }

    fn detail(&self) -> &str {
        self.chain()
            .first()
            .map_or("no diagnostic available", String::as_str)
    }

    fn log_error(&self, status: u16) {
        error!(
            target = TARGET,
            status,
            method = %self.method,
            path = %self.path,
            elapsed_ms = self.elapsed_ms,
            source = self.source(),
            detail = self.detail(),
            chain = ?self.chain(),
            request_id = %self.request_id,
            user = %self.user,
            "request failed",
        );
    }

    fn log_warn(&self, status: u16) {
        warn!(
            target = TARGET,
            status,
            method = %self.method,
            path = %self.path,
            elapsed_ms = self.elapsed_ms,
            source = self.source(),
            detail = self.detail(),
            request_id = %self.request_id,
            user = %self.user,
            "client request error",
        );
    }
}
