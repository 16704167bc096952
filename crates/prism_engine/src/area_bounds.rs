//! Area bounds tracking.
//!
//! Maintains one encapsulating bounding volume per logical area over all
//! placed instances belonging to that area. Volumes are created lazily on
//! first placement, grow to include every further placement and never shrink
//! automatically; an explicit reset recomputes a fresh unit-sized bound
//! centred on the average of the current placements. The volumes gate
//! player-position analytics to relevant areas.

use prism_types::{AreaId, AreaVolume, Vec3};
use std::collections::HashMap;
use tracing::debug;

/// Per-area bounding volumes, keyed by area id.
#[derive(Default)]
pub struct AreaBoundsTracker {
    bounds: HashMap<AreaId, AreaVolume>,
    instance_counts: HashMap<AreaId, usize>,
}

impl AreaBoundsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one placed instance: seeds the area's volume on first
    /// placement, otherwise grows it to include the position.
    pub fn on_instance_placed(&mut self, area_id: &AreaId, position: Vec3) {
        if area_id.is_empty() {
            return;
        }
        match self.bounds.get_mut(area_id) {
            Some(volume) => volume.encapsulate(position),
            None => {
                debug!("Creating area bounds for area {area_id}");
                self.bounds.insert(area_id.clone(), AreaVolume::from_point(position));
            }
        }
        *self.instance_counts.entry(area_id.clone()).or_insert(0) += 1;
    }

    /// Unregisters one instance of an area. Removing the last instance
    /// deletes the area's volume entirely.
    pub fn on_instance_removed(&mut self, area_id: &AreaId) {
        let Some(count) = self.instance_counts.get_mut(area_id) else {
            return;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            debug!("Removing area bounds for area {area_id}");
            self.instance_counts.remove(area_id);
            self.bounds.remove(area_id);
        }
    }

    /// Recomputes the area's volume from scratch: unit default size centred
    /// on the average of the given positions, then re-encapsulated over all
    /// of them. Growth history is discarded.
    pub fn reset_bounds(&mut self, area_id: &AreaId, positions: &[Vec3]) {
        if !self.bounds.contains_key(area_id) {
            return;
        }
        let center = Vec3::average(positions);
        let mut volume = AreaVolume::from_point(center);
        for position in positions {
            volume.encapsulate(*position);
        }
        self.bounds.insert(area_id.clone(), volume);
    }

    /// The current volume of an area, if any instance is placed in it.
    pub fn volume(&self, area_id: &AreaId) -> Option<&AreaVolume> {
        self.bounds.get(area_id)
    }

    /// Ids of every area whose volume overlaps a probe sphere at `point`.
    /// An observer inside several overlapping areas yields several ids.
    pub fn areas_overlapping(&self, point: Vec3, radius: f64) -> Vec<AreaId> {
        self.bounds
            .iter()
            .filter(|(_, volume)| volume.overlaps_sphere(point, radius))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn area_count(&self) -> usize {
        self.bounds.len()
    }
}
