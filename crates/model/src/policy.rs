//! Publication window of a poll relative to the current clock reading.

use chrono::{DateTime, TimeDelta, Utc};

/// How far back a poll still counts as recently published.
pub fn recent_window() -> TimeDelta {
    TimeDelta::days(1)
}

/// A poll is visible once its publication instant is no longer in the future.
pub fn is_visible(now: DateTime<Utc>, publish_at: DateTime<Utc>) -> bool {
    publish_at <= now
}

/// A poll is recent when it was published within the trailing day, both ends inclusive.
/// Future polls are never recent.
pub fn is_recent(now: DateTime<Utc>, publish_at: DateTime<Utc>) -> bool {
    if !is_visible(now, publish_at) {
        return false;
    }

    // Without a representable lower bound, everything up to `now` is recent.
    now.checked_sub_signed(recent_window()).map_or(true, |since| since <= publish_at)
}
