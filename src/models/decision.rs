//! Delivery decision returned by the engine.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one feed item against a source's history.
///
/// The notification layer transmits only when `deliver` is true. Transmit
/// failures are not reported back and do not roll back the sighting already
/// recorded, so delivery is at-most-once from the engine's perspective.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decision {
    /// Whether the item should be delivered
    pub deliver: bool,
    /// Dedup key the decision was made on
    pub key: String,
    /// Why: "new", "debounced", "expired" or "cycle"
    pub reason: String,
}

impl Decision {
    /// True when the item was suppressed rather than delivered.
    pub fn suppressed(&self) -> bool {
        !self.deliver
    }
}
