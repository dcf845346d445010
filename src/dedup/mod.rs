//! Dedup key derivation and sighting history.
//!
//! - `normalize`: canonical forms for links and authors
//! - `key`: stable dedup key for a feed item, with a diagnostic trace
//! - `history`: bounded, time-windowed map of key -> last sighting

pub mod history;
pub mod key;
pub mod normalize;

pub use history::{History, Reason};
pub use key::{KeySource, KeyTrace, generate_key};
pub use normalize::{normalize_author, normalize_link};
