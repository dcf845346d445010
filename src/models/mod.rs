//! Data models exchanged with the feed-fetch and notification layers.

pub mod decision;
pub mod item;

pub use decision::Decision;
pub use item::FeedItem;
