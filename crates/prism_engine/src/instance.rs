//! Placed slot instances and fulfillment result application.
//!
//! A [`SlotInstance`] is one placed occurrence of a catalog unit in the
//! running scene. It owns the session-scoped fulfillment state (checksum,
//! fulfilled flag, active fulfillment id) and the URL-equality de-duplication
//! that decides between `CompletedWithContent` and
//! `CompletedWithSameContent`.

use crate::lod::LodState;
use prism_types::{
    AreaId, ContentSlotConfig, FulfillmentId, FulfillmentStatusCode, InstanceId, LodStatus,
    ResponseMetadata, UnitFulfillmentResponse, UnitFulfillmentUpdate, UnitId, Vec3,
};
use tracing::info;

/// Capability implemented by content consumers (loaders) for one instance.
///
/// Implementations are selected per content kind by the host application; the
/// engine fans updates out to every observer registered for an instance.
pub trait FulfillmentObserver: Send + Sync {
    /// Receives every fulfillment status update for the instance, including
    /// the synchronous `Started` signal emitted before the network call.
    fn handle_fulfillment(&self, update: &UnitFulfillmentUpdate);

    /// Receives LOD transitions for the instance.
    fn handle_lod_change(&self, _status: LodStatus) {}
}

/// One placed occurrence of a content unit.
#[derive(Debug, Clone)]
pub struct SlotInstance {
    pub id: InstanceId,
    pub unit_id: UnitId,
    pub area_id: AreaId,
    pub position: Vec3,
    pub config: ContentSlotConfig,
    pub lod: LodState,
    /// Content version marker adopted from the last checksum fetch or
    /// fulfillment. Empty until first observed.
    pub last_fulfillment_checksum: Option<String>,
    /// Set once any fulfillment result has been applied this session. Gates
    /// checksum polling so an instance is never polled before its first
    /// fulfillment.
    pub fulfilled_since_session_start: bool,
    pub active_fulfillment_id: Option<FulfillmentId>,
    /// True once a Range-behaviour instance has fired its one-time trigger.
    pub range_triggered: bool,
    content: Option<ResponseMetadata>,
}

impl SlotInstance {
    /// Creates the instance as it becomes active in the running scene.
    ///
    /// The initial LOD state is computed from the current distance to the
    /// observer.
    pub fn new(
        unit_id: UnitId,
        area_id: AreaId,
        position: Vec3,
        config: ContentSlotConfig,
        distance_to_observer: f64,
    ) -> Self {
        let lod = LodState::at_activation(distance_to_observer, config.lod_distance_meters);
        Self {
            id: InstanceId::new(),
            unit_id,
            area_id,
            position,
            config,
            lod,
            last_fulfillment_checksum: None,
            fulfilled_since_session_start: false,
            active_fulfillment_id: None,
            range_triggered: false,
            content: None,
        }
    }

    /// Resets session-scoped state when the instance becomes active again,
    /// e.g. on scene reload. Prevents polling from re-fulfilling an instance
    /// that has not been instant- or manually-fulfilled yet.
    pub fn reactivate(&mut self, distance_to_observer: f64) {
        self.fulfilled_since_session_start = false;
        self.last_fulfillment_checksum = None;
        self.range_triggered = false;
        self.lod = LodState::at_activation(distance_to_observer, self.config.lod_distance_meters);
    }

    /// True when this instance still owes its one-time range-triggered
    /// fulfillment and the observer is within range.
    pub fn range_trigger_due(&self, distance_to_observer: f64) -> bool {
        self.config.fulfillment_behaviour == prism_types::FulfillmentBehaviour::Range
            && !self.range_triggered
            && !self.fulfilled_since_session_start
            && distance_to_observer <= self.config.fulfillment_range_meters
    }

    /// Applies one unit response to this instance and produces the update to
    /// fan out to consumers.
    ///
    /// URL string equality is the sole idempotence check for "same content":
    /// a backend returning semantically identical content under a rotated URL
    /// reads as new content here.
    pub fn apply_response(&mut self, response: &UnitFulfillmentResponse) -> UnitFulfillmentUpdate {
        let update = match &response.metadata {
            Some(metadata) if metadata.kind() == self.config.kind => {
                let same = self.has_same_content(metadata);
                self.content = Some(metadata.clone());
                let status = if same {
                    FulfillmentStatusCode::CompletedWithSameContent
                } else {
                    FulfillmentStatusCode::CompletedWithContent
                };
                info!(
                    "Unit {} fulfilled with {} content",
                    self.unit_id,
                    if same { "same" } else { "new" }
                );
                UnitFulfillmentUpdate {
                    status,
                    unit_id: self.unit_id.clone(),
                    fulfillment_id: Some(response.fulfillment_id.clone()),
                    content: Some(metadata.clone()),
                }
            }
            Some(_) => {
                info!(
                    "Unit {} was not fulfilled, metadata was incorrect kind",
                    self.unit_id
                );
                self.content = None;
                UnitFulfillmentUpdate {
                    status: FulfillmentStatusCode::Failed,
                    unit_id: self.unit_id.clone(),
                    fulfillment_id: Some(response.fulfillment_id.clone()),
                    content: None,
                }
            }
            None => {
                info!("Unit {} was not fulfilled (completed empty)", self.unit_id);
                self.content = None;
                UnitFulfillmentUpdate {
                    status: FulfillmentStatusCode::CompletedEmpty,
                    unit_id: self.unit_id.clone(),
                    fulfillment_id: Some(response.fulfillment_id.clone()),
                    content: None,
                }
            }
        };

        self.fulfilled_since_session_start = true;
        self.active_fulfillment_id = Some(response.fulfillment_id.clone());
        update
    }

    /// The `Started` update emitted synchronously before a chunk's network
    /// call is issued, so consumers can show a loading state.
    pub fn started_update(&self) -> UnitFulfillmentUpdate {
        UnitFulfillmentUpdate {
            status: FulfillmentStatusCode::Started,
            unit_id: self.unit_id.clone(),
            fulfillment_id: None,
            content: None,
        }
    }

    fn has_same_content(&self, incoming: &ResponseMetadata) -> bool {
        match &self.content {
            Some(stored) => {
                let stored_urls = stored.dedup_urls();
                let incoming_urls = incoming.dedup_urls();
                !stored_urls.iter().any(|u| u.trim().is_empty())
                    && stored_urls == incoming_urls
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_types::{ContentKind, FulfillmentBehaviour};

    fn image_instance() -> SlotInstance {
        SlotInstance::new(
            UnitId::new("unit-1"),
            AreaId::new("area-1"),
            Vec3::default(),
            ContentSlotConfig {
                kind: ContentKind::Image,
                min_quality_id: "low".to_string(),
                max_quality_id: "high".to_string(),
                fulfillment_behaviour: FulfillmentBehaviour::Instant,
                fulfillment_range_meters: 0.0,
                lod_distance_meters: 0.0,
            },
            0.0,
        )
    }

    fn image_response(low: &str, high: &str) -> UnitFulfillmentResponse {
        UnitFulfillmentResponse {
            unit_id: UnitId::new("unit-1"),
            fulfillment_id: FulfillmentId::new("f-1"),
            metadata: Some(ResponseMetadata::Image {
                low_url: low.to_string(),
                high_url: high.to_string(),
            }),
            custom_metadata: Vec::new(),
        }
    }

    #[test]
    fn same_url_twice_yields_same_content_on_second_application() {
        let mut instance = image_instance();

        let first = instance.apply_response(&image_response("a-low", "a-high"));
        assert_eq!(first.status, FulfillmentStatusCode::CompletedWithContent);

        let second = instance.apply_response(&image_response("a-low", "a-high"));
        assert_eq!(
            second.status,
            FulfillmentStatusCode::CompletedWithSameContent
        );

        // A changed URL is new content again.
        let third = instance.apply_response(&image_response("b-low", "b-high"));
        assert_eq!(third.status, FulfillmentStatusCode::CompletedWithContent);
    }

    #[test]
    fn empty_metadata_completes_empty_and_clears_content() {
        let mut instance = image_instance();
        instance.apply_response(&image_response("a-low", "a-high"));

        let update = instance.apply_response(&UnitFulfillmentResponse {
            unit_id: UnitId::new("unit-1"),
            fulfillment_id: FulfillmentId::new("f-2"),
            metadata: None,
            custom_metadata: Vec::new(),
        });
        assert_eq!(update.status, FulfillmentStatusCode::CompletedEmpty);

        // Content was cleared, so the original URLs count as new again.
        let next = instance.apply_response(&image_response("a-low", "a-high"));
        assert_eq!(next.status, FulfillmentStatusCode::CompletedWithContent);
    }

    #[test]
    fn wrong_kind_metadata_fails() {
        let mut instance = image_instance();
        let update = instance.apply_response(&UnitFulfillmentResponse {
            unit_id: UnitId::new("unit-1"),
            fulfillment_id: FulfillmentId::new("f-3"),
            metadata: Some(ResponseMetadata::Audio {
                audio_url: "https://cdn/a.ogg".to_string(),
            }),
            custom_metadata: Vec::new(),
        });
        assert_eq!(update.status, FulfillmentStatusCode::Failed);
        assert!(instance.fulfilled_since_session_start);
    }

    #[test]
    fn reactivation_clears_session_state() {
        let mut instance = image_instance();
        instance.apply_response(&image_response("a-low", "a-high"));
        instance.last_fulfillment_checksum = Some("c1".to_string());

        instance.reactivate(0.0);
        assert!(!instance.fulfilled_since_session_start);
        assert_eq!(instance.last_fulfillment_checksum, None);
    }

    #[test]
    fn range_trigger_requires_behaviour_and_proximity() {
        let mut instance = image_instance();
        instance.config.fulfillment_behaviour = FulfillmentBehaviour::Range;
        instance.config.fulfillment_range_meters = 5.0;

        assert!(instance.range_trigger_due(4.0));
        assert!(!instance.range_trigger_due(6.0));

        instance.range_triggered = true;
        assert!(!instance.range_trigger_due(4.0));
    }
}
