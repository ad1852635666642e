use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::PaginationError;
use crate::application::repos::RepoError;
use crate::domain::types::UserId;
use crate::infra::error::InfraError;

/// Diagnostic chain attached to error responses and consumed by the
/// response-logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Coarse error classes handed to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Collision,
    Storage,
    InvalidArgument,
}

/// Errors returned by the microblog core operations.
#[derive(Debug, Error)]
pub enum MicroblogError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("user `{actor}` is not the author of post {post_id}")]
    Unauthorized { actor: UserId, post_id: Uuid },
    #[error("insert still colliding after {attempts} attempts")]
    Collision { attempts: u32 },
    #[error("storage failure")]
    Storage(#[source] RepoError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl MicroblogError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MicroblogError::NotFound { .. } => ErrorKind::NotFound,
            MicroblogError::Unauthorized { .. } => ErrorKind::Unauthorized,
            MicroblogError::Collision { .. } => ErrorKind::Collision,
            MicroblogError::Storage(_) => ErrorKind::Storage,
            MicroblogError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }
}

impl From<PaginationError> for MicroblogError {
    fn from(error: PaginationError) -> Self {
        match error {
            PaginationError::StaleCursor => MicroblogError::not_found("page token"),
            PaginationError::InvalidCursor(_) | PaginationError::InvalidSize(_) => {
                MicroblogError::InvalidArgument(error.to_string())
            }
        }
    }
}

impl From<RepoError> for MicroblogError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::NotFound => MicroblogError::not_found("resource"),
            RepoError::Duplicate { .. } => MicroblogError::Collision { attempts: 1 },
            RepoError::Pagination(err) => MicroblogError::from(err),
            RepoError::InvalidInput { message } => MicroblogError::InvalidArgument(message),
            other => MicroblogError::Storage(other),
        }
    }
}

/// Process-level failures surfaced by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_errors_normalize_to_taxonomy() {
        assert_eq!(
            MicroblogError::from(RepoError::NotFound).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            MicroblogError::from(RepoError::duplicate("posts_pkey")).kind(),
            ErrorKind::Collision
        );
        assert_eq!(
            MicroblogError::from(RepoError::Timeout).kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            MicroblogError::from(RepoError::Pagination(PaginationError::StaleCursor)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            MicroblogError::from(PaginationError::InvalidSize(-3)).kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn report_collects_source_chain() {
        let error = MicroblogError::Storage(RepoError::from_persistence("connection reset"));
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &error);

        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[0], "storage failure");
        assert!(report.messages[1].contains("connection reset"));
    }
}
