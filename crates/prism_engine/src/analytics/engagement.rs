//! Audio/video engagement correlation.
//!
//! One engagement lifecycle is keyed by (instance, fulfillment) and maps to a
//! correlation reference minted on Start and freed on End. Start is idempotent
//! while the key is live; any other action without a live key is dropped with
//! a diagnostic.

use prism_types::{CorrelationId, EventMetadata, FulfillmentId, InstanceId, MediaAction};
use std::collections::HashMap;
use tracing::info;

/// Identifies one audio or video engagement lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngagementKey {
    pub instance_id: InstanceId,
    pub fulfillment_id: FulfillmentId,
}

/// Which media stream an engagement map tracks. Audio and video lifecycles
/// are correlated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaChannel {
    Audio,
    Video,
}

impl MediaChannel {
    fn label(&self) -> &'static str {
        match self {
            MediaChannel::Audio => "audio",
            MediaChannel::Video => "video",
        }
    }
}

/// Correlation map for one media channel.
#[derive(Default)]
pub struct EngagementMap {
    active: HashMap<EngagementKey, CorrelationId>,
}

impl EngagementMap {
    /// Correlates one media action.
    ///
    /// Returns the event metadata to log, or `None` when the action is
    /// dropped (duplicate Start, or non-Start without a live engagement).
    pub fn correlate(
        &mut self,
        channel: MediaChannel,
        instance_id: InstanceId,
        fulfillment_id: &FulfillmentId,
        action: MediaAction,
    ) -> Option<EventMetadata> {
        let key = EngagementKey {
            instance_id,
            fulfillment_id: fulfillment_id.clone(),
        };

        let reference = match (action, self.active.get(&key)) {
            (MediaAction::Start, Some(_)) => {
                info!(
                    "{} already started for instance {instance_id}, skipping start event",
                    channel.label()
                );
                return None;
            }
            (MediaAction::Start, None) => {
                let reference = CorrelationId::new();
                self.active.insert(key.clone(), reference);
                reference
            }
            (_, Some(reference)) => *reference,
            (_, None) => {
                info!(
                    "{} start event for instance {instance_id} has not been sent, event will not be logged",
                    channel.label()
                );
                return None;
            }
        };

        if action == MediaAction::End {
            self.active.remove(&key);
        }

        Some(match channel {
            MediaChannel::Audio => EventMetadata::Audio {
                action,
                instance_id,
                fulfillment_id: fulfillment_id.clone(),
                reference,
            },
            MediaChannel::Video => EventMetadata::Video {
                action,
                instance_id,
                fulfillment_id: fulfillment_id.clone(),
                reference,
            },
        })
    }

    /// Synthesizes End metadata for every still-open engagement, clearing the
    /// map. Used by the session-stop flush.
    pub fn drain_as_end_events(&mut self, channel: MediaChannel) -> Vec<EventMetadata> {
        self.active
            .drain()
            .map(|(key, reference)| match channel {
                MediaChannel::Audio => EventMetadata::Audio {
                    action: MediaAction::End,
                    instance_id: key.instance_id,
                    fulfillment_id: key.fulfillment_id,
                    reference,
                },
                MediaChannel::Video => EventMetadata::Video {
                    action: MediaAction::End,
                    instance_id: key.instance_id,
                    fulfillment_id: key.fulfillment_id,
                    reference,
                },
            })
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.active.len()
    }
}
