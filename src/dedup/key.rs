// src/dedup/key.rs

//! Stable dedup key derivation.
//!
//! Priority: entry `id`, then `guid`, then the normalized link. The chosen
//! identifier is always combined with the normalized author so that two
//! authors posting the same link on an aggregator source count as distinct
//! sightings.

use serde::Serialize;

use crate::models::FeedItem;

use super::normalize::{normalize_author, normalize_link_filtered};

/// Which item field produced the identifier half of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    EntryId,
    Guid,
    Link,
}

/// Diagnostic trace of one key derivation.
///
/// Observability only; decisions never depend on it.
#[derive(Debug, Clone, Serialize)]
pub struct KeyTrace {
    /// Field that won the identifier priority
    pub source: KeySource,
    /// Raw id/guid value, when one was used
    pub entry_id: Option<String>,
    /// Raw link, when the key fell back to it
    pub link_raw: Option<String>,
    /// Normalized link, when the key fell back to it
    pub link_normalized: Option<String>,
    /// Raw author value as received
    pub author_raw: Option<String>,
    /// Normalized author segment
    pub author_normalized: String,
    /// Final dedup key
    pub key: String,
}

fn stable_entry_id(item: &FeedItem) -> Option<(KeySource, String)> {
    if let Some(id) = item.id.as_deref() {
        let id = id.trim();
        if !id.is_empty() {
            return Some((KeySource::EntryId, id.to_string()));
        }
    }
    if let Some(guid) = item.guid.as_deref() {
        let guid = guid.trim();
        if !guid.is_empty() {
            return Some((KeySource::Guid, guid.to_string()));
        }
    }
    None
}

/// Derive the dedup key for a feed item.
///
/// Total: absent id/guid/link/author all degrade to empty-string segments,
/// never to an error.
pub fn generate_key(item: &FeedItem, extra_tracking_prefixes: &[String]) -> (String, KeyTrace) {
    let author_raw = item.author.clone();
    let author_normalized = normalize_author(item.author.as_deref().unwrap_or(""));

    if let Some((source, entry_id)) = stable_entry_id(item) {
        let key = format!("id:{entry_id}:author:{author_normalized}");
        let trace = KeyTrace {
            source,
            entry_id: Some(entry_id),
            link_raw: None,
            link_normalized: None,
            author_raw,
            author_normalized,
            key: key.clone(),
        };
        return (key, trace);
    }

    let link_raw = item.link.clone().unwrap_or_default();
    let link_normalized = normalize_link_filtered(&link_raw, extra_tracking_prefixes);
    let key = format!("link:{link_normalized}:author:{author_normalized}");
    let trace = KeyTrace {
        source: KeySource::Link,
        entry_id: None,
        link_raw: Some(link_raw),
        link_normalized: Some(link_normalized),
        author_raw,
        author_normalized,
        key: key.clone(),
    };
    (key, trace)
}
