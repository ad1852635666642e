//! Caller identity taken from the `System-Design-User-Id` header.
//!
//! The header is trusted; only its shape (a lowercase hex token) is checked
//! before the value reaches the core.

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::domain::types::UserId;

use super::error::ApiError;

pub const USER_ID_HEADER: &str = "system-design-user-id";

pub async fn require_identity(mut request: Request<Body>, next: Next) -> Response {
    let user = match identity_from_headers(request.headers()) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(user.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    response
}

pub fn identity_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let value = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::unauthorized("No user specified"))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("Wrong user id format"))?;

    if !is_user_id(value) {
        return Err(ApiError::unauthorized("Wrong user id format"));
    }
    Ok(UserId::from(value))
}

pub fn is_user_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
