//! Per-instance LOD state machine.
//!
//! Two states, no terminal state: an instance is either inside or outside the
//! high-quality range of the observer. The state is re-evaluated every tick
//! while a session is active, but a transition notification is emitted only
//! when the computed value actually changes. A LOD change never triggers a
//! fulfillment request; it only retargets which previously-fetched quality
//! variant is displayed.

use prism_types::{ContentSlotConfig, LodStatus};

/// LOD state held by one slot instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodState {
    status: LodStatus,
}

impl LodState {
    /// Computes the initial state at instance activation.
    ///
    /// A `lod_distance_meters` of zero means "always high quality" and forces
    /// the inside state regardless of distance.
    pub fn at_activation(distance_to_observer: f64, lod_distance_meters: f64) -> Self {
        let status = if within_range(distance_to_observer, lod_distance_meters) {
            LodStatus::InsideHighQualityRange
        } else {
            LodStatus::OutsideHighQualityRange
        };
        Self { status }
    }

    /// Current status.
    pub fn status(&self) -> LodStatus {
        self.status
    }

    /// Re-evaluates the state against the current observer distance.
    ///
    /// Returns `Some(new_status)` exactly when the state flips; repeated
    /// evaluation at a constant distance returns `None`. Units whose quality
    /// tiers are equal are never re-evaluated since LOD has no effect on them.
    pub fn evaluate(
        &mut self,
        config: &ContentSlotConfig,
        distance_to_observer: f64,
    ) -> Option<LodStatus> {
        if !config.lod_applies() {
            return None;
        }

        let inside_now = within_range(distance_to_observer, config.lod_distance_meters);
        let new_status = if inside_now {
            LodStatus::InsideHighQualityRange
        } else {
            LodStatus::OutsideHighQualityRange
        };

        if new_status == self.status {
            return None;
        }

        self.status = new_status;
        Some(new_status)
    }
}

fn within_range(distance: f64, lod_distance: f64) -> bool {
    lod_distance == 0.0 || distance <= lod_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_types::{ContentKind, FulfillmentBehaviour};

    fn config(min: &str, max: &str, lod_distance: f64) -> ContentSlotConfig {
        ContentSlotConfig {
            kind: ContentKind::Image,
            min_quality_id: min.to_string(),
            max_quality_id: max.to_string(),
            fulfillment_behaviour: FulfillmentBehaviour::Instant,
            fulfillment_range_meters: 0.0,
            lod_distance_meters: lod_distance,
        }
    }

    #[test]
    fn initial_state_follows_distance() {
        assert_eq!(
            LodState::at_activation(5.0, 10.0).status(),
            LodStatus::InsideHighQualityRange
        );
        assert_eq!(
            LodState::at_activation(15.0, 10.0).status(),
            LodStatus::OutsideHighQualityRange
        );
    }

    #[test]
    fn zero_distance_means_always_high_quality() {
        assert_eq!(
            LodState::at_activation(1000.0, 0.0).status(),
            LodStatus::InsideHighQualityRange
        );
    }

    #[test]
    fn transition_fires_exactly_once_per_flip() {
        let config = config("low", "high", 10.0);
        let mut state = LodState::at_activation(5.0, 10.0);

        // Constant distance, repeated ticks: nothing.
        assert_eq!(state.evaluate(&config, 5.0), None);
        assert_eq!(state.evaluate(&config, 5.0), None);

        // Walk out of range: one event.
        assert_eq!(
            state.evaluate(&config, 15.0),
            Some(LodStatus::OutsideHighQualityRange)
        );
        assert_eq!(state.evaluate(&config, 15.0), None);

        // Walk back in: one event.
        assert_eq!(
            state.evaluate(&config, 5.0),
            Some(LodStatus::InsideHighQualityRange)
        );
    }

    #[test]
    fn equal_quality_tiers_are_never_evaluated() {
        let config = config("high", "high", 10.0);
        let mut state = LodState::at_activation(5.0, 10.0);
        assert_eq!(state.evaluate(&config, 15.0), None);
        assert_eq!(state.status(), LodStatus::InsideHighQualityRange);
    }
}
