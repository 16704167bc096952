//! Event correlator.
//!
//! Turns raw engagement signals (gaze hit-tests, audio/video play state
//! changes, player position samples, conversions) into well-formed,
//! de-duplicated event sequences and ships them to the remote collector.
//! Delivery is at-most-once: a batch that fails to send is logged and
//! dropped, never retried.

pub mod engagement;
pub mod gaze;

pub use engagement::{EngagementKey, EngagementMap, MediaChannel};
pub use gaze::{GazeTracker, StampedMetadata, TrackableHit};

use crate::area_bounds::AreaBoundsTracker;
use crate::context::SharedContext;
use crate::scene::SceneProvider;
use crate::transport::ApiClient;
use prism_types::{
    EngagementEvent, EventMetadata, FulfillmentId, InstanceId, MediaAction, Pose, SessionId, Vec3,
};
use std::sync::Arc;
use tracing::{error, info};

/// Correlates engagement signals into event sequences and flushes them.
pub struct EventCorrelator {
    context: SharedContext,
    transport: Arc<dyn ApiClient>,
    gaze: GazeTracker,
    audio: EngagementMap,
    video: EngagementMap,
    last_player_position: Option<Vec3>,
    ready: bool,
}

impl EventCorrelator {
    pub fn new(context: SharedContext, transport: Arc<dyn ApiClient>, gaze_threshold: f64) -> Self {
        Self {
            context,
            transport,
            gaze: GazeTracker::new(gaze_threshold),
            audio: EngagementMap::default(),
            video: EngagementMap::default(),
            last_player_position: None,
            ready: false,
        }
    }

    /// Enables tracking. Called once the engine has verified an observer pose
    /// source is available.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Per-tick gaze tracking: hit-test, resolve to a trackable instance and
    /// feed the gaze state machine. A completed cycle is sent as one batch.
    pub async fn track_gaze(&mut self, scene: &dyn SceneProvider, max_distance: f64) {
        if !self.ready {
            return;
        }
        let Some(observer) = scene.observer_pose() else {
            return;
        };
        let Some(session_id) = self.session_id().await else {
            return;
        };

        let trackable = match scene.raycast_forward(max_distance) {
            Some(hit) => self.resolve_trackable(hit).await,
            None => None,
        };

        if let Some(batch) = self.gaze.observe(trackable, observer) {
            self.send_batch(attach_session(&session_id, batch));
        }
    }

    /// Per-tick player sampling: one PlayerUpdate per overlapping area, only
    /// when the observer moved past the position threshold.
    pub async fn track_player(
        &mut self,
        scene: &dyn SceneProvider,
        bounds: &AreaBoundsTracker,
        position_threshold: f64,
        probe_radius: f64,
    ) {
        if !self.ready {
            return;
        }
        let Some(observer) = scene.observer_pose() else {
            return;
        };
        let Some(session_id) = self.session_id().await else {
            return;
        };

        if let Some(last) = self.last_player_position {
            if last.distance(&observer.position) <= position_threshold {
                return;
            }
        }
        self.last_player_position = Some(observer.position);

        let events: Vec<EventMetadata> = bounds
            .areas_overlapping(observer.position, probe_radius)
            .into_iter()
            .map(|area_id| EventMetadata::PlayerUpdate {
                player_position: observer.position,
                player_rotation: observer.rotation,
                area_id,
            })
            .collect();

        if !events.is_empty() {
            self.send_batch(stamp_all(&session_id, events));
        }
    }

    /// Logs one audio engagement action.
    pub async fn log_audio(
        &mut self,
        instance_id: InstanceId,
        fulfillment_id: Option<&FulfillmentId>,
        action: MediaAction,
    ) {
        self.log_media(MediaChannel::Audio, instance_id, fulfillment_id, action)
            .await;
    }

    /// Logs one video engagement action.
    pub async fn log_video(
        &mut self,
        instance_id: InstanceId,
        fulfillment_id: Option<&FulfillmentId>,
        action: MediaAction,
    ) {
        self.log_media(MediaChannel::Video, instance_id, fulfillment_id, action)
            .await;
    }

    /// Logs one conversion event for a fulfilled instance.
    pub async fn log_conversion(
        &mut self,
        instance_id: InstanceId,
        fulfillment_id: Option<&FulfillmentId>,
    ) {
        let Some(session_id) = self.session_id().await else {
            return;
        };
        let Some(fulfillment_id) = fulfillment_id else {
            info!("Instance {instance_id} has not been fulfilled, aborting conversion event");
            return;
        };
        self.send_batch(vec![EngagementEvent::new(
            session_id,
            EventMetadata::Converted {
                instance_id,
                fulfillment_id: fulfillment_id.clone(),
            },
        )]);
    }

    /// Session-stop flush: ends the pending gaze cycle, synthesizes End
    /// events for every open audio/video engagement and sends everything as
    /// one final batch. Awaited so the batch is delivered before the session
    /// close call.
    pub async fn flush_session_stop(&mut self, observer: Option<Pose>) {
        let Some(session_id) = self.session_id().await else {
            return;
        };

        let mut events = Vec::new();
        if let Some(gaze_batch) = self.gaze.flush(observer.unwrap_or_default()) {
            events.extend(attach_session(&session_id, gaze_batch));
        }
        let ends = self
            .audio
            .drain_as_end_events(MediaChannel::Audio)
            .into_iter()
            .chain(self.video.drain_as_end_events(MediaChannel::Video));
        events.extend(stamp_all(&session_id, ends.collect()));

        if events.is_empty() {
            return;
        }

        if let Err(e) = self.transport.send_events(&events).await {
            error!("Failed to send final analytics batch: {e}");
        }
    }

    async fn log_media(
        &mut self,
        channel: MediaChannel,
        instance_id: InstanceId,
        fulfillment_id: Option<&FulfillmentId>,
        action: MediaAction,
    ) {
        let Some(session_id) = self.session_id().await else {
            return;
        };
        let Some(fulfillment_id) = fulfillment_id else {
            info!("Instance {instance_id} has not been fulfilled, aborting event creation");
            return;
        };

        if let Some(metadata) = self
            .audio_or_video(channel)
            .correlate(channel, instance_id, fulfillment_id, action)
        {
            self.send_batch(vec![EngagementEvent::new(session_id, metadata)]);
        }
    }

    fn audio_or_video(&mut self, channel: MediaChannel) -> &mut EngagementMap {
        match channel {
            MediaChannel::Audio => &mut self.audio,
            MediaChannel::Video => &mut self.video,
        }
    }

    async fn session_id(&self) -> Option<SessionId> {
        self.context.read().await.session_id().cloned()
    }

    async fn resolve_trackable(&self, hit: crate::scene::GazeHit) -> Option<TrackableHit> {
        let instance_id = hit.instance_id?;
        let context = self.context.read().await;
        let instance = context.registry.get(instance_id)?;
        // An unfulfilled instance is not trackable; it is ignored until it
        // becomes fulfilled.
        let fulfillment_id = instance.active_fulfillment_id.clone()?;
        Some(TrackableHit {
            instance_id,
            fulfillment_id,
            hit_point: hit.hit_point,
            instance_pose: hit.instance_pose,
        })
    }

    /// Ships a batch without blocking the tick. Failures are logged and the
    /// batch is dropped.
    fn send_batch(&self, events: Vec<EngagementEvent>) {
        if events.is_empty() {
            return;
        }
        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.send_events(&events).await {
                error!("Failed to send analytics batch: {e}");
            }
        });
    }
}

fn stamp_all(session_id: &SessionId, batch: Vec<EventMetadata>) -> Vec<EngagementEvent> {
    batch
        .into_iter()
        .map(|metadata| EngagementEvent::new(session_id.clone(), metadata))
        .collect()
}

/// Attaches the session id to pre-stamped metadata, keeping the timestamps
/// taken when the events happened.
fn attach_session(session_id: &SessionId, batch: Vec<StampedMetadata>) -> Vec<EngagementEvent> {
    batch
        .into_iter()
        .map(|stamped| EngagementEvent {
            session_id: session_id.clone(),
            timestamp: stamped.timestamp,
            metadata: stamped.metadata,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::context::EngineContext;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use prism_types::{
        FulfillmentRequest, FulfillmentResponse, SessionDescriptor, SessionParameters,
        UnitChecksum, UnitId,
    };
    use std::sync::Mutex;
    use tokio::sync::RwLock;

    struct CollectingClient {
        batches: Mutex<Vec<Vec<EngagementEvent>>>,
    }

    impl CollectingClient {
        fn new() -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
            }
        }

        fn batches(&self) -> Vec<Vec<EngagementEvent>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApiClient for CollectingClient {
        async fn start_session(
            &self,
            _project_id: &str,
            _parameters: &SessionParameters,
        ) -> Result<SessionDescriptor, TransportError> {
            Ok(SessionDescriptor {
                id: SessionId::new("session-1"),
            })
        }

        async fn stop_session(&self, _session_id: &SessionId) -> Result<(), TransportError> {
            Ok(())
        }

        async fn fulfill(
            &self,
            _request: &FulfillmentRequest,
        ) -> Result<FulfillmentResponse, TransportError> {
            Ok(FulfillmentResponse { units: Vec::new() })
        }

        async fn get_checksums(
            &self,
            _unit_ids: &[UnitId],
        ) -> Result<Vec<UnitChecksum>, TransportError> {
            Ok(Vec::new())
        }

        async fn send_events(&self, events: &[EngagementEvent]) -> Result<(), TransportError> {
            self.batches.lock().unwrap().push(events.to_vec());
            Ok(())
        }

        async fn add_session_tag(
            &self,
            _session_id: &SessionId,
            _tag_id: &str,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn remove_session_tag(
            &self,
            _session_id: &SessionId,
            _tag_id: &str,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn correlator_with_session() -> (EventCorrelator, Arc<CollectingClient>) {
        let mut context = EngineContext::new(EngineConfig::default());
        context.set_session(SessionId::new("session-1"));
        let context = Arc::new(RwLock::new(context));
        let transport = Arc::new(CollectingClient::new());
        let mut correlator = EventCorrelator::new(context, transport.clone(), 0.05);
        correlator.set_ready(true);
        (correlator, transport)
    }

    async fn settle() {
        // Let the spawned send tasks run.
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn media_event_without_fulfillment_is_dropped() {
        let (mut correlator, transport) = correlator_with_session();
        correlator
            .log_audio(InstanceId::new(), None, MediaAction::Start)
            .await;
        settle().await;
        assert!(transport.batches().is_empty());
    }

    #[tokio::test]
    async fn duplicate_audio_start_sends_one_event() {
        let (mut correlator, transport) = correlator_with_session();
        let instance = InstanceId::new();
        let fulfillment = FulfillmentId::new("f-1");

        correlator
            .log_audio(instance, Some(&fulfillment), MediaAction::Start)
            .await;
        correlator
            .log_audio(instance, Some(&fulfillment), MediaAction::Start)
            .await;
        settle().await;

        assert_eq!(transport.batches().len(), 1);
    }

    #[tokio::test]
    async fn session_stop_synthesizes_end_events_in_one_batch() {
        let (mut correlator, transport) = correlator_with_session();
        let fulfillment = FulfillmentId::new("f-1");

        correlator
            .log_audio(InstanceId::new(), Some(&fulfillment), MediaAction::Start)
            .await;
        correlator
            .log_video(InstanceId::new(), Some(&fulfillment), MediaAction::Start)
            .await;
        settle().await;
        assert_eq!(transport.batches().len(), 2);

        correlator.flush_session_stop(None).await;
        let batches = transport.batches();
        assert_eq!(batches.len(), 3);

        let last = batches.last().unwrap();
        assert_eq!(last.len(), 2);
        assert!(last.iter().all(|e| matches!(
            e.metadata,
            EventMetadata::Audio {
                action: MediaAction::End,
                ..
            } | EventMetadata::Video {
                action: MediaAction::End,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn conversion_requires_a_fulfillment_id() {
        let (mut correlator, transport) = correlator_with_session();
        let instance = InstanceId::new();

        correlator.log_conversion(instance, None).await;
        settle().await;
        assert!(transport.batches().is_empty());

        correlator
            .log_conversion(instance, Some(&FulfillmentId::new("f-1")))
            .await;
        settle().await;
        assert_eq!(transport.batches().len(), 1);
    }

    #[tokio::test]
    async fn media_logging_is_gated_on_session_not_readiness() {
        let (mut correlator, transport) = correlator_with_session();
        correlator.set_ready(false);
        correlator
            .log_audio(
                InstanceId::new(),
                Some(&FulfillmentId::new("f-1")),
                MediaAction::Start,
            )
            .await;
        settle().await;
        assert_eq!(transport.batches().len(), 1);
    }
}
