//! # Engagement Event Model
//!
//! The analytics events the engine batches and ships to the remote collector:
//! gaze, audio, video, player-position and conversion events. Every event of
//! one engagement lifecycle carries the same correlation reference so the
//! collector can join Start/Update/End triples.

use crate::ids::{AreaId, CorrelationId, FulfillmentId, InstanceId, SessionId};
use crate::math::{Rotation, Vec3};
use serde::{Deserialize, Serialize};

/// Returns the current Unix timestamp in milliseconds.
///
/// All engagement events use this function for timestamp generation so event
/// ordering within a session is consistent.
///
/// # Panics
///
/// Panics if the system clock is set to a time before the Unix epoch. This
/// should never happen in practice on modern systems.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

/// Lifecycle action of a gaze engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GazeAction {
    Start,
    Update,
    End,
}

/// Lifecycle action of an audio or video engagement.
///
/// Everything between `Start` and `End` is an update from the correlator's
/// point of view: it requires an existing correlation reference and does not
/// change the engagement map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaAction {
    Start,
    Paused,
    Resumed,
    Muted,
    Unmuted,
    Stopped,
    End,
}

/// Kind-specific payload of one engagement event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventMetadata {
    #[serde(rename_all = "camelCase")]
    Gaze {
        action: GazeAction,
        instance_id: InstanceId,
        fulfillment_id: FulfillmentId,
        instance_hit_position: Vec3,
        instance_position: Vec3,
        instance_rotation: Rotation,
        player_position: Vec3,
        player_rotation: Rotation,
        reference: CorrelationId,
    },
    #[serde(rename_all = "camelCase")]
    Audio {
        action: MediaAction,
        instance_id: InstanceId,
        fulfillment_id: FulfillmentId,
        reference: CorrelationId,
    },
    #[serde(rename_all = "camelCase")]
    Video {
        action: MediaAction,
        instance_id: InstanceId,
        fulfillment_id: FulfillmentId,
        reference: CorrelationId,
    },
    #[serde(rename_all = "camelCase")]
    PlayerUpdate {
        player_position: Vec3,
        player_rotation: Rotation,
        area_id: AreaId,
    },
    #[serde(rename_all = "camelCase")]
    Converted {
        instance_id: InstanceId,
        fulfillment_id: FulfillmentId,
    },
}

/// One engagement event, stamped with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementEvent {
    pub session_id: SessionId,
    pub timestamp: u64,
    pub metadata: EventMetadata,
}

impl EngagementEvent {
    /// Stamps a new event with the current timestamp.
    pub fn new(session_id: SessionId, metadata: EventMetadata) -> Self {
        Self {
            session_id,
            timestamp: current_timestamp(),
            metadata,
        }
    }
}
