//! Feed item input model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry from a feed, fully resolved by the external parsing layer.
///
/// The parser populates `id`/`guid`/`author` once, using its documented
/// fallback order over the raw feed fields; the engine reads these values
/// as-is and does no field probing of its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    /// Stable entry identifier (RSS/Atom `id`)
    #[serde(default)]
    pub id: Option<String>,

    /// RSS `guid`, used when `id` is absent
    #[serde(default)]
    pub guid: Option<String>,

    /// Entry link
    #[serde(default)]
    pub link: Option<String>,

    /// Entry author as resolved by the parser
    #[serde(default)]
    pub author: Option<String>,

    /// Entry title (display only; never part of the dedup key)
    #[serde(default)]
    pub title: Option<String>,

    /// Publication time, if the feed carried one
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}
