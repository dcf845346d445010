// src/dedup/normalize.rs

//! Link and author canonicalization.
//!
//! Both functions are total: any input produces a usable string, with
//! malformed links degrading to a trimmed, lower-cased fallback instead of
//! failing. `normalize_link` is idempotent, so keys derived from already
//! normalized links do not drift.

use regex::Regex;
use url::Url;

/// Exact query parameter names stripped during link normalization.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "_ga",
    "_gac",
    "_gl",
    "_ke",
    "ref",
    "referrer",
    "source",
    "share",
    "share_from",
    "share_id",
];

/// Query parameter name prefixes stripped during link normalization.
const TRACKING_PREFIXES: &[&str] = &["utm_"];

fn is_tracking_param(name: &str, extra_prefixes: &[String]) -> bool {
    let lower = name.to_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str())
        || TRACKING_PREFIXES.iter().any(|p| lower.starts_with(p))
        || extra_prefixes
            .iter()
            .filter(|p| !p.is_empty())
            .any(|p| lower.starts_with(&p.to_lowercase()))
}

/// Normalize a link for deduplication with the built-in tracking set only.
///
/// # Examples
/// ```
/// use feedguard::dedup::normalize_link;
///
/// assert_eq!(
///     normalize_link("https://EX.com/p/?utm_source=a&id=1#frag"),
///     "https://ex.com/p?id=1"
/// );
/// ```
pub fn normalize_link(raw: &str) -> String {
    normalize_link_filtered(raw, &[])
}

/// Normalize a link for deduplication.
///
/// - lower-cases scheme and host
/// - strips tracking parameters (built-in set plus `extra_prefixes`)
/// - sorts remaining query pairs lexicographically
/// - drops the fragment
/// - trims trailing slashes from the path
///
/// Unparseable input degrades to the trimmed, lower-cased raw string.
pub fn normalize_link_filtered(raw: &str, extra_prefixes: &[String]) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };

    // query_pairs_mut panics on cannot-be-a-base URLs (mailto: etc.)
    if url.cannot_be_a_base() {
        return trimmed.to_lowercase();
    }

    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k, extra_prefixes))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = url.query_pairs_mut();
        serializer.clear();
        serializer.extend_pairs(pairs);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let stripped = path.trim_end_matches('/');
        url.set_path(if stripped.is_empty() { "/" } else { stripped });
    }

    url.to_string()
}

/// Normalize an author name: strip markup tags, collapse whitespace runs to
/// a single space, lower-case. Absent or empty input yields the empty
/// string.
///
/// Lower-casing is Unicode-aware; scripts without case (CJK and others)
/// pass through unchanged.
pub fn normalize_author(raw: &str) -> String {
    let without_tags = match Regex::new(r"<[^>]+>") {
        Ok(re) => re.replace_all(raw, "").into_owned(),
        Err(_) => raw.to_string(),
    };

    without_tags
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
