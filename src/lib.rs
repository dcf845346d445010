// src/lib.rs

//! feedguard: deduplication and debounce engine for feed monitors.
//!
//! Given a stream of feed items, the engine decides deterministically (and
//! across process restarts) whether an item was already delivered within its
//! source's debounce window. Feed fetching, notification delivery and
//! command handling are external collaborators that talk to the [`Engine`]
//! façade.

pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod models;
pub mod storage;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{AppError, Result};
pub use models::{Decision, FeedItem};
pub use storage::LocalStateStore;
