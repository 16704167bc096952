//! # Slot Configuration
//!
//! Static per-unit configuration authored in the project catalog. This data is
//! read-only to the engine during a session; it may be edited between
//! sessions.

use serde::{Deserialize, Serialize};

/// The kind of content a slot can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Image,
    Video,
    Audio,
    ThreeDimensional,
    Data,
}

/// When a placed slot instance gets fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentBehaviour {
    /// Fulfilled by the engine-wide instant pass once per session.
    Instant,
    /// Self-triggers a one-time fulfillment when the observer comes within
    /// range of the instance.
    Range,
    /// Fulfilled only when application code asks for it.
    Manual,
}

/// Whether an instance is currently within the distance threshold that
/// warrants high-quality content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LodStatus {
    InsideHighQualityRange,
    OutsideHighQualityRange,
}

/// Static configuration of one catalog content unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSlotConfig {
    pub kind: ContentKind,
    /// Quality tier served while outside the LOD range.
    pub min_quality_id: String,
    /// Quality tier served while inside the LOD range.
    pub max_quality_id: String,
    pub fulfillment_behaviour: FulfillmentBehaviour,
    /// Trigger distance for `FulfillmentBehaviour::Range`, in meters.
    pub fulfillment_range_meters: f64,
    /// LOD threshold distance in meters. Zero means "always high quality".
    pub lod_distance_meters: f64,
}

impl ContentSlotConfig {
    /// True when the min and max quality tiers differ, i.e. LOD switching can
    /// have any effect for this unit.
    pub fn lod_applies(&self) -> bool {
        self.min_quality_id != self.max_quality_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: &str, max: &str) -> ContentSlotConfig {
        ContentSlotConfig {
            kind: ContentKind::Image,
            min_quality_id: min.to_string(),
            max_quality_id: max.to_string(),
            fulfillment_behaviour: FulfillmentBehaviour::Instant,
            fulfillment_range_meters: 0.0,
            lod_distance_meters: 10.0,
        }
    }

    #[test]
    fn lod_applies_only_when_tiers_differ() {
        assert!(config("low", "high").lod_applies());
        assert!(!config("high", "high").lod_applies());
    }
}
