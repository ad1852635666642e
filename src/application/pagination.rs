//! Shared cursor pagination helpers.
//!
//! Every ordered sequence in the system (an author's post-line, a viewer's
//! feed) is exposed newest-first and paged with the same opaque cursor. The
//! cursor names the last item of the previous page by its ordering key, so
//! it stays valid while new items are appended at the head.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::types::{Sequence, UserId};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Which ordered sequence a cursor was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorScope {
    PostLine,
    Feed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SequenceCursorPayload {
    scope: CursorScope,
    owner: String,
    sequence: Sequence,
}

/// Cursor referencing an item of one user's post-line or feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCursor {
    scope: CursorScope,
    owner: UserId,
    sequence: Sequence,
}

impl SequenceCursor {
    /// Cursor into the post-line authored by `owner`.
    pub fn post_line(owner: UserId, sequence: Sequence) -> Self {
        Self {
            scope: CursorScope::PostLine,
            owner,
            sequence,
        }
    }

    /// Cursor into the feed viewed by `owner`.
    pub fn feed(owner: UserId, sequence: Sequence) -> Self {
        Self {
            scope: CursorScope::Feed,
            owner,
            sequence,
        }
    }

    pub fn scope(&self) -> CursorScope {
        self.scope
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Reject cursors minted for another user or another kind of sequence.
    pub fn ensure_issued_for(
        &self,
        scope: CursorScope,
        owner: &UserId,
    ) -> Result<(), PaginationError> {
        if self.scope == scope && &self.owner == owner {
            Ok(())
        } else {
            Err(PaginationError::StaleCursor)
        }
    }

    pub fn encode(&self) -> String {
        let payload = SequenceCursorPayload {
            scope: self.scope,
            owner: self.owner.as_str().to_string(),
            sequence: self.sequence,
        };
        let serialized = serde_json::to_vec(&payload)
            .expect("serializing sequence cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: SequenceCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            scope: payload.scope,
            owner: UserId::from(payload.owner),
            sequence: payload.sequence,
        })
    }

    /// Decode an optional raw token; the empty string means "start from the newest item".
    pub fn decode_token(token: Option<&str>) -> Result<Option<Self>, PaginationError> {
        match token {
            None => Ok(None),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => Self::decode(raw).map(Some),
        }
    }
}

/// Resolve a caller-supplied page size: absent means the default, negative
/// values are rejected, oversized values are clamped.
pub fn resolve_page_size(
    requested: Option<i64>,
    default: u32,
    max: u32,
) -> Result<u32, PaginationError> {
    match requested {
        None => Ok(default.min(max)),
        Some(value) if value < 0 => Err(PaginationError::InvalidSize(value)),
        Some(value) => Ok(u32::try_from(value).unwrap_or(u32::MAX).min(max)),
    }
}

/// Page-size policy applied to every paged read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Turn raw boundary input into a request for a sequence of `scope`
    /// owned by `owner`.
    pub fn request(
        &self,
        scope: CursorScope,
        owner: &UserId,
        token: Option<&str>,
        size: Option<i64>,
    ) -> Result<PageRequest<SequenceCursor>, PaginationError> {
        let limit = resolve_page_size(size, self.default_size, self.max_size)?;
        let cursor = SequenceCursor::decode_token(token)?;
        if let Some(cursor) = &cursor {
            cursor.ensure_issued_for(scope, owner)?;
        }
        Ok(PageRequest::new(limit, cursor))
    }
}

/// Cursor-aware pagination request.
#[derive(Debug, Clone)]
pub struct PageRequest<C> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    pub fn new(limit: u32, cursor: Option<C>) -> Self {
        Self { limit, cursor }
    }
}

/// Cursor-aware page result.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

/// Build a page from the items that follow the cursor, newest first.
///
/// Reads at most `limit + 1` items; the extra one only signals that another
/// page exists, in which case the cursor names the last item kept.
pub fn collect_page<T>(
    newest_first: impl IntoIterator<Item = T>,
    limit: u32,
    cursor_for: impl Fn(&T) -> SequenceCursor,
) -> CursorPage<T> {
    if limit == 0 {
        return CursorPage::empty();
    }

    let limit = limit as usize;
    let mut items: Vec<T> = newest_first.into_iter().take(limit + 1).collect();
    let has_more = items.len() > limit;
    if has_more {
        items.truncate(limit);
    }

    let next_cursor = if has_more {
        items.last().map(|last| cursor_for(last).encode())
    } else {
        None
    };

    CursorPage::new(items, next_cursor)
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("invalid page size {0}: must not be negative")]
    InvalidSize(i64),
    #[error("cursor does not reference an item of the requested sequence")]
    StaleCursor,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> UserId {
        UserId::new("a1")
    }

    #[test]
    fn post_line_cursor_round_trip() {
        let cursor = SequenceCursor::post_line(owner(), 17);
        let encoded = cursor.encode();
        let decoded = SequenceCursor::decode(&encoded).expect("decoded cursor");

        assert_eq!(decoded, cursor);
        assert_eq!(decoded.scope(), CursorScope::PostLine);
        assert_eq!(decoded.sequence(), 17);
    }

    #[test]
    fn encoded_cursor_uses_token_alphabet() {
        let encoded = SequenceCursor::feed(UserId::new("deadbeef"), i64::MAX).encode();
        assert!(
            encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        );
    }

    #[test]
    fn decoding_invalid_cursor_reports_error() {
        let err = SequenceCursor::decode("not base64!").expect_err("invalid cursor rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));

        let garbage = URL_SAFE_NO_PAD.encode(b"{\"scope\":\"nope\"}");
        let err = SequenceCursor::decode(&garbage).expect_err("bad payload rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }

    #[test]
    fn empty_token_means_start_from_head() {
        assert!(SequenceCursor::decode_token(None).unwrap().is_none());
        assert!(SequenceCursor::decode_token(Some("")).unwrap().is_none());
    }

    #[test]
    fn cursor_for_other_owner_or_scope_is_stale() {
        let cursor = SequenceCursor::post_line(owner(), 3);

        assert!(cursor.ensure_issued_for(CursorScope::PostLine, &owner()).is_ok());
        assert!(matches!(
            cursor.ensure_issued_for(CursorScope::PostLine, &UserId::new("b2")),
            Err(PaginationError::StaleCursor)
        ));
        assert!(matches!(
            cursor.ensure_issued_for(CursorScope::Feed, &owner()),
            Err(PaginationError::StaleCursor)
        ));
    }

    #[test]
    fn page_size_resolution() {
        assert_eq!(resolve_page_size(None, 10, 100).unwrap(), 10);
        assert_eq!(resolve_page_size(Some(0), 10, 100).unwrap(), 0);
        assert_eq!(resolve_page_size(Some(250), 10, 100).unwrap(), 100);
        assert!(matches!(
            resolve_page_size(Some(-1), 10, 100),
            Err(PaginationError::InvalidSize(-1))
        ));
    }

    #[test]
    fn page_limits_validate_token_before_size_is_used() {
        let limits = PageLimits::default();
        let token = SequenceCursor::feed(owner(), 9).encode();

        let request = limits
            .request(CursorScope::Feed, &owner(), Some(&token), None)
            .expect("own feed token accepted");
        assert_eq!(request.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(request.cursor.map(|c| c.sequence()), Some(9));

        assert!(matches!(
            limits.request(CursorScope::PostLine, &owner(), Some(&token), None),
            Err(PaginationError::StaleCursor)
        ));
        assert!(matches!(
            limits.request(CursorScope::Feed, &owner(), Some("%%"), None),
            Err(PaginationError::InvalidCursor(_))
        ));
    }

    #[test]
    fn collect_page_emits_cursor_only_when_more_remain() {
        let cursor_for = |seq: &i64| SequenceCursor::post_line(owner(), *seq);

        let page = collect_page(vec![5, 4, 3], 2, cursor_for);
        assert_eq!(page.items, vec![5, 4]);
        let next = SequenceCursor::decode(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(next.sequence(), 4);

        let page = collect_page(vec![3], 2, cursor_for);
        assert_eq!(page.items, vec![3]);
        assert!(page.next_cursor.is_none());

        let page = collect_page(vec![2, 1], 2, cursor_for);
        assert_eq!(page.items, vec![2, 1]);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn zero_limit_yields_empty_terminal_page() {
        let page = collect_page(vec![1, 2, 3], 0, |seq: &i64| {
            SequenceCursor::feed(owner(), *seq)
        });
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
