//! Gaze session tracking.
//!
//! Turns per-tick hit-test results into complete Start/Update(s)/End event
//! cycles. Events of one cycle are held on the session and sent as a single
//! batch when the cycle ends; the End of the previous cycle is always flushed
//! before a Start is recorded for a different target.

use prism_types::{
    current_timestamp, CorrelationId, EventMetadata, FulfillmentId, GazeAction, InstanceId, Pose,
    Vec3,
};
use tracing::debug;

/// Event metadata stamped when the action happened. The session id is only
/// attached when the batch is sent, so a Start created seconds before the
/// cycle ends keeps its own timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StampedMetadata {
    pub timestamp: u64,
    pub metadata: EventMetadata,
}

impl StampedMetadata {
    fn now(metadata: EventMetadata) -> Self {
        Self {
            timestamp: current_timestamp(),
            metadata,
        }
    }
}

/// A gaze hit already resolved to a trackable (fulfilled) slot instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackableHit {
    pub instance_id: InstanceId,
    pub fulfillment_id: FulfillmentId,
    pub hit_point: Vec3,
    pub instance_pose: Pose,
}

/// One in-progress gaze engagement.
struct GazeSession {
    instance_id: InstanceId,
    fulfillment_id: FulfillmentId,
    reference: CorrelationId,
    instance_pose: Pose,
    last_hit_point: Vec3,
    start: StampedMetadata,
    updates: Vec<StampedMetadata>,
}

impl GazeSession {
    fn event(&self, action: GazeAction, hit_point: Vec3, observer: Pose) -> EventMetadata {
        EventMetadata::Gaze {
            action,
            instance_id: self.instance_id,
            fulfillment_id: self.fulfillment_id.clone(),
            instance_hit_position: hit_point,
            instance_position: self.instance_pose.position,
            instance_rotation: self.instance_pose.rotation,
            player_position: observer.position,
            player_rotation: observer.rotation,
            reference: self.reference,
        }
    }
}

/// Per-tick gaze state machine.
#[derive(Default)]
pub struct GazeTracker {
    session: Option<GazeSession>,
    /// Minimum hit-point movement before an Update is recorded.
    pub position_threshold: f64,
}

impl GazeTracker {
    pub fn new(position_threshold: f64) -> Self {
        Self {
            session: None,
            position_threshold,
        }
    }

    /// Feeds one tick's resolved hit into the tracker.
    ///
    /// Returns the completed batch (Start + Updates + End) when the previous
    /// gaze cycle ended this tick, to be sent as one request.
    pub fn observe(
        &mut self,
        hit: Option<TrackableHit>,
        observer: Pose,
    ) -> Option<Vec<StampedMetadata>> {
        match hit {
            Some(hit) => {
                if let Some(session) = &mut self.session {
                    if session.instance_id == hit.instance_id {
                        // Same target: exact-point equality and sub-threshold
                        // movement are both no-ops.
                        if session.last_hit_point == hit.hit_point {
                            return None;
                        }
                        if session.last_hit_point.distance(&hit.hit_point)
                            <= self.position_threshold
                        {
                            return None;
                        }
                        session.last_hit_point = hit.hit_point;
                        let update = session.event(GazeAction::Update, hit.hit_point, observer);
                        session.updates.push(StampedMetadata::now(update));
                        return None;
                    }
                }

                // A different target: the previous cycle ends before the new
                // session starts.
                let flushed = self.flush(observer);
                self.begin(hit, observer);
                flushed
            }
            None => self.flush(observer),
        }
    }

    /// Ends the pending session, if any, and returns its full batch.
    pub fn flush(&mut self, observer: Pose) -> Option<Vec<StampedMetadata>> {
        let session = self.session.take()?;
        debug!("Sending gaze events for instance {}", session.instance_id);

        let end = session.event(GazeAction::End, session.last_hit_point, observer);
        let mut batch = Vec::with_capacity(session.updates.len() + 2);
        batch.push(session.start.clone());
        batch.extend(session.updates.clone());
        batch.push(StampedMetadata::now(end));
        Some(batch)
    }

    /// True while a gaze cycle is pending.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    fn begin(&mut self, hit: TrackableHit, observer: Pose) {
        let reference = CorrelationId::new();
        let start = EventMetadata::Gaze {
            action: GazeAction::Start,
            instance_id: hit.instance_id,
            fulfillment_id: hit.fulfillment_id.clone(),
            instance_hit_position: hit.hit_point,
            instance_position: hit.instance_pose.position,
            instance_rotation: hit.instance_pose.rotation,
            player_position: observer.position,
            player_rotation: observer.rotation,
            reference,
        };
        self.session = Some(GazeSession {
            instance_id: hit.instance_id,
            fulfillment_id: hit.fulfillment_id,
            reference,
            instance_pose: hit.instance_pose,
            last_hit_point: hit.hit_point,
            start: StampedMetadata::now(start),
            updates: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(instance: InstanceId, point: Vec3) -> TrackableHit {
        TrackableHit {
            instance_id: instance,
            fulfillment_id: FulfillmentId::new("f-1"),
            hit_point: point,
            instance_pose: Pose::default(),
        }
    }

    fn actions(batch: &[StampedMetadata]) -> Vec<GazeAction> {
        batch
            .iter()
            .map(|m| match &m.metadata {
                EventMetadata::Gaze { action, .. } => *action,
                _ => panic!("expected gaze metadata"),
            })
            .collect()
    }

    #[test]
    fn full_cycle_yields_start_update_end() {
        let mut tracker = GazeTracker::new(0.05);
        let observer = Pose::default();
        let a = InstanceId::new();
        let b = InstanceId::new();

        // none -> A: begin, nothing flushed.
        assert!(tracker
            .observe(Some(hit(a, Vec3::new(0.0, 0.0, 0.0))), observer)
            .is_none());

        // A, moved under the threshold: no-op.
        assert!(tracker
            .observe(Some(hit(a, Vec3::new(0.01, 0.0, 0.0))), observer)
            .is_none());

        // A, moved past the threshold: one Update recorded.
        assert!(tracker
            .observe(Some(hit(a, Vec3::new(0.2, 0.0, 0.0))), observer)
            .is_none());

        // A -> B: A's batch flushes, B starts.
        let batch_a = tracker
            .observe(Some(hit(b, Vec3::new(1.0, 0.0, 0.0))), observer)
            .unwrap();
        assert_eq!(
            actions(&batch_a),
            vec![GazeAction::Start, GazeAction::Update, GazeAction::End]
        );

        // B -> nothing: B's batch flushes with no updates.
        let batch_b = tracker.observe(None, observer).unwrap();
        assert_eq!(actions(&batch_b), vec![GazeAction::Start, GazeAction::End]);
        assert!(!tracker.is_active());
    }

    #[test]
    fn same_point_is_a_no_op() {
        let mut tracker = GazeTracker::new(0.05);
        let observer = Pose::default();
        let a = InstanceId::new();
        let point = Vec3::new(0.0, 1.0, 0.0);

        tracker.observe(Some(hit(a, point)), observer);
        tracker.observe(Some(hit(a, point)), observer);
        tracker.observe(Some(hit(a, point)), observer);

        let batch = tracker.observe(None, observer).unwrap();
        assert_eq!(actions(&batch), vec![GazeAction::Start, GazeAction::End]);
    }

    #[test]
    fn one_correlation_reference_per_cycle() {
        let mut tracker = GazeTracker::new(0.05);
        let observer = Pose::default();
        let a = InstanceId::new();

        tracker.observe(Some(hit(a, Vec3::new(0.0, 0.0, 0.0))), observer);
        tracker.observe(Some(hit(a, Vec3::new(0.5, 0.0, 0.0))), observer);
        let batch = tracker.observe(None, observer).unwrap();

        let references: std::collections::HashSet<String> = batch
            .iter()
            .map(|m| match &m.metadata {
                EventMetadata::Gaze { reference, .. } => reference.to_string(),
                _ => panic!("expected gaze metadata"),
            })
            .collect();
        assert_eq!(references.len(), 1);
    }

    #[test]
    fn events_are_stamped_when_they_happen_not_at_flush() {
        let mut tracker = GazeTracker::new(0.05);
        let observer = Pose::default();
        let a = InstanceId::new();

        tracker.observe(Some(hit(a, Vec3::new(0.0, 0.0, 0.0))), observer);
        std::thread::sleep(std::time::Duration::from_millis(30));
        tracker.observe(Some(hit(a, Vec3::new(0.5, 0.0, 0.0))), observer);
        std::thread::sleep(std::time::Duration::from_millis(30));
        let batch = tracker.observe(None, observer).unwrap();

        let start = batch.first().unwrap().timestamp;
        let update = batch[1].timestamp;
        let end = batch.last().unwrap().timestamp;
        assert!(update >= start + 20, "update carries its own timestamp");
        assert!(end >= update + 20, "end is stamped at flush");
    }

    #[test]
    fn flush_without_session_is_none() {
        let mut tracker = GazeTracker::new(0.05);
        assert!(tracker.flush(Pose::default()).is_none());
    }
}
