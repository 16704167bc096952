//! Scene capability.
//!
//! Narrow view of the host scene: where the observer is and what its forward
//! ray hits. Raycasting and collider bookkeeping stay on the host side; the
//! engine only consumes the results.

use prism_types::{InstanceId, Pose, Vec3};

/// Result of a forward raycast from the observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeHit {
    /// The slot instance the hit collider belongs to, if any. `None` means a
    /// non-trackable object was hit.
    pub instance_id: Option<InstanceId>,
    /// World-space hit point on the collider.
    pub hit_point: Vec3,
    /// Pose of the hit object.
    pub instance_pose: Pose,
}

/// Provides observer pose and gaze hit-testing for the running scene.
pub trait SceneProvider: Send + Sync {
    /// Current observer (camera / HMD) pose, or `None` when no observer is
    /// assigned. A missing observer disables analytics but not fulfillment.
    fn observer_pose(&self) -> Option<Pose>;

    /// Casts a ray forward from the observer up to `max_distance` meters.
    fn raycast_forward(&self, max_distance: f64) -> Option<GazeHit>;

    /// Current world position of a placed instance.
    fn instance_position(&self, instance_id: InstanceId) -> Option<Vec3>;
}
