use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::application::pagination::CursorPage;
use crate::domain::entities::Post;
use crate::domain::types::UserId;

#[derive(Debug, Deserialize, Serialize)]
pub struct PostTextRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: Uuid,
    pub text: String,
    pub author_id: String,
    pub created_at: String,
    pub last_modified_at: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            text: post.text,
            author_id: post.author_id.into_inner(),
            created_at: format_timestamp(post.created_at),
            last_modified_at: format_timestamp(post.last_modified_at),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPageResponse {
    pub posts: Vec<PostResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
}

impl From<CursorPage<Post>> for PostPageResponse {
    fn from(page: CursorPage<Post>) -> Self {
        let page = page.map(PostResponse::from);
        Self {
            posts: page.items,
            next_page: page.next_cursor,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UserListResponse {
    pub users: Vec<String>,
}

impl From<BTreeSet<UserId>> for UserListResponse {
    fn from(users: BTreeSet<UserId>) -> Self {
        Self {
            users: users.into_iter().map(UserId::into_inner).collect(),
        }
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}
