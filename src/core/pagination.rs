use chrono::{DateTime, Utc};

use crate::config::PAGE_LIMIT;
use crate::core::errors::ApiError;

/// One page of query results, at most [`PAGE_LIMIT`] items. Each item keeps
/// the sort key it was ordered by so callers can hand out the resume cursor.
pub struct Page<T> {
    pub items: Vec<(DateTime<Utc>, T)>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Page {
            items: Vec::new(),
            has_more: false,
        }
    }

    /// Exclusive resume point for the next page: the sort key of the last
    /// returned item. Only offered while more data exists.
    pub fn next_cursor(&self) -> Option<DateTime<Utc>> {
        if self.has_more {
            self.items.last().map(|(key, _)| *key)
        } else {
            None
        }
    }
}

/// Parse an optional client cursor. The only accepted encoding is RFC3339;
/// anything else is rejected instead of patched up.
pub fn parse_cursor(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| ApiError::BadRequest(format!("invalid cursor: {}", s))),
    }
}

/// Order key-tagged items newest first, apply the cursor as a strict upper
/// bound, and fetch one row past the page size to learn whether more exist.
/// The probe row is dropped before the page is returned.
pub fn paginate<T>(
    mut keyed: Vec<(DateTime<Utc>, T)>,
    cursor: Option<DateTime<Utc>>,
) -> Page<T> {
    if let Some(bound) = cursor {
        keyed.retain(|(key, _)| *key < bound);
    }
    keyed.sort_by(|a, b| b.0.cmp(&a.0));

    let mut items: Vec<(DateTime<Utc>, T)> = keyed
        .into_iter()
        .take(PAGE_LIMIT + 1)
        .collect();

    let has_more = items.len() == PAGE_LIMIT + 1;
    items.truncate(PAGE_LIMIT);

    Page { items, has_more }
}
