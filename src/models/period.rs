use serde::{Deserialize, Serialize};

/// Immutable time-range filter over `viewed_at`, unix seconds.
///
/// Either side may be open; both open means "all time". Bounds are
/// inclusive wherever they are set, and every storage backend applies the
/// same four-branch logic that [`Period::contains`] encodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    start: Option<i64>,
    end: Option<i64>,
}

impl Period {
    /// No time filter at all.
    pub fn all() -> Self {
        Self::default()
    }

    /// Views at or after `start`.
    pub fn since(start: i64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Views at or before `end`.
    pub fn upto(end: i64) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Views within `start..=end`.
    pub fn between(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn start(&self) -> Option<i64> {
        self.start
    }

    pub fn end(&self) -> Option<i64> {
        self.end
    }

    /// Whether this period places no constraint on `viewed_at`.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Inclusive containment check, the reference semantics for all backends.
    pub fn contains(&self, viewed_at: i64) -> bool {
        match (self.start, self.end) {
            (Some(start), None) => viewed_at >= start,
            (None, Some(end)) => viewed_at <= end,
            (Some(start), Some(end)) => viewed_at >= start && viewed_at <= end,
            (None, None) => true,
        }
    }
}
