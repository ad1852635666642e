use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ErrorKind, ErrorReport, MicroblogError};

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const COLLISION: &str = "collision";
    pub const STORAGE: &str = "storage_error";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    chain: Vec<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            chain: Vec::new(),
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized(message: &'static str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, message, None)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<MicroblogError> for ApiError {
    fn from(err: MicroblogError) -> Self {
        let (status, code, message) = match err.kind() {
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, codes::NOT_FOUND, "Not found"),
            ErrorKind::Unauthorized => (
                StatusCode::FORBIDDEN,
                codes::FORBIDDEN,
                "Post belongs to another user",
            ),
            ErrorKind::Collision => (
                StatusCode::CONFLICT,
                codes::COLLISION,
                "Could not allocate a unique record",
            ),
            ErrorKind::InvalidArgument => (
                StatusCode::BAD_REQUEST,
                codes::INVALID_ARGUMENT,
                "Invalid argument",
            ),
            ErrorKind::Storage => (
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::STORAGE,
                "Storage failure",
            ),
        };

        // Storage causes stay in the log; clients only see the class.
        let hint = (status != StatusCode::INTERNAL_SERVER_ERROR).then(|| err.to_string());
        let report = ErrorReport::from_error("infra::http::api", status, &err);

        Self {
            status,
            code,
            message,
            hint,
            chain: report.messages,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = if self.chain.is_empty() {
            ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        } else {
            ErrorReport {
                source: "infra::http::api",
                status: self.status,
                messages: self.chain,
            }
        };

        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::application::repos::RepoError;
    use crate::domain::types::UserId;

    #[test]
    fn taxonomy_maps_to_transport_statuses() {
        let cases = [
            (MicroblogError::not_found("post"), StatusCode::NOT_FOUND),
            (
                MicroblogError::Unauthorized {
                    actor: UserId::from("ab"),
                    post_id: Uuid::nil(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                MicroblogError::Collision { attempts: 5 },
                StatusCode::CONFLICT,
            ),
            (
                MicroblogError::invalid_argument("size"),
                StatusCode::BAD_REQUEST,
            ),
            (
                MicroblogError::Storage(RepoError::Timeout),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn storage_errors_hide_details_but_report_chain() {
        let err = MicroblogError::Storage(RepoError::from_persistence("connection reset"));
        let response = ApiError::from(err).into_response();

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(report.messages.len() >= 2);
        assert!(
            report
                .messages
                .iter()
                .any(|message| message.contains("connection reset"))
        );
    }
}
