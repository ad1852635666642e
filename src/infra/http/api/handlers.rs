use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::domain::types::UserId;
use crate::infra::http::HttpState;

use super::error::ApiError;
use super::identity::is_user_id;
use super::models::*;

pub async fn create_post(
    State(state): State<HttpState>,
    Extension(user): Extension<UserId>,
    payload: Result<Json<PostTextRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(json_rejection)?;

    let post = state.microblog.create_post(user, payload.text).await?;
    Ok(Json(PostResponse::from(post)))
}

pub async fn get_post(
    State(state): State<HttpState>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_post_id(&post_id)?;

    let post = state.microblog.get_post(id).await?;
    Ok(Json(PostResponse::from(post)))
}

pub async fn update_post(
    State(state): State<HttpState>,
    Extension(user): Extension<UserId>,
    Path(post_id): Path<String>,
    payload: Result<Json<PostTextRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_post_id(&post_id)?;
    let Json(payload) = payload.map_err(json_rejection)?;

    let post = state
        .microblog
        .change_post_text(id, &user, &payload.text)
        .await?;
    Ok(Json(PostResponse::from(post)))
}

pub async fn list_user_posts(
    State(state): State<HttpState>,
    Path(user_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let author = parse_path_user_id(user_id)?;
    let (token, size) = parse_page_query(&query)?;

    let page = state
        .microblog
        .get_post_line(&author, token, size)
        .await?;
    Ok(Json(PostPageResponse::from(page)))
}

pub async fn subscribe(
    State(state): State<HttpState>,
    Extension(user): Extension<UserId>,
    Path(to_user): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let to_user = parse_path_user_id(to_user)?;

    state.microblog.subscribe(&user, &to_user).await?;
    Ok(StatusCode::OK)
}

pub async fn list_subscriptions(
    State(state): State<HttpState>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.microblog.get_subscriptions(&user).await?;
    Ok(Json(UserListResponse::from(users)))
}

pub async fn list_subscribers(
    State(state): State<HttpState>,
    Extension(user): Extension<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.microblog.get_subscribers(&user).await?;
    Ok(Json(UserListResponse::from(users)))
}

pub async fn feed(
    State(state): State<HttpState>,
    Extension(user): Extension<UserId>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (token, size) = parse_page_query(&query)?;

    let page = state.microblog.get_feed(&user, token, size).await?;
    Ok(Json(PostPageResponse::from(page)))
}

/// Post IDs are UUIDs; anything else cannot name a stored post.
fn parse_post_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found("Post not found"))
}

/// Path segments naming a user follow the header format; other values match
/// no route.
fn parse_path_user_id(raw: String) -> Result<UserId, ApiError> {
    if is_user_id(&raw) {
        Ok(UserId::from(raw))
    } else {
        Err(ApiError::not_found("User not found"))
    }
}

fn parse_page_query(query: &PageQuery) -> Result<(Option<&str>, Option<i64>), ApiError> {
    let token = query.page.as_deref().filter(|token| !token.is_empty());
    if let Some(token) = token
        && !is_page_token(token)
    {
        return Err(ApiError::bad_request(
            "Wrong page token format",
            Some(token.to_string()),
        ));
    }

    let size = match query.size.as_deref().filter(|size| !size.is_empty()) {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            ApiError::bad_request("Wrong size query", Some(raw.to_string()))
        })?),
        None => None,
    };

    Ok((token, size))
}

fn is_page_token(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("Invalid request body", Some(rejection.body_text()))
}
