//! Shared domain value types.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Global ordering key assigned to a post at insertion time.
///
/// Strictly increasing across all authors so that feeds mixing several
/// authors interleave in publish order.
pub type Sequence = i64;

/// Per-post edit counter.
pub type PostVersion = i64;

pub const FIRST_VERSION: PostVersion = 1;

/// Opaque user identifier supplied (and trusted) by the boundary layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Current UTC time truncated to whole seconds.
pub fn now_utc_seconds() -> OffsetDateTime {
    truncate_to_seconds(OffsetDateTime::now_utc())
}

pub fn truncate_to_seconds(value: OffsetDateTime) -> OffsetDateTime {
    value - Duration::nanoseconds(i64::from(value.nanosecond()))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn truncation_drops_subsecond_component() {
        let value = datetime!(2024-03-01 12:30:45.987_654_321 UTC);
        let truncated = truncate_to_seconds(value);

        assert_eq!(truncated, datetime!(2024-03-01 12:30:45 UTC));
        assert_eq!(truncated.nanosecond(), 0);
    }

    #[test]
    fn user_id_serializes_as_plain_string() {
        let user = UserId::new("a1b2");
        let json = serde_json::to_string(&user).expect("serialize user id");
        assert_eq!(json, "\"a1b2\"");
    }
}
