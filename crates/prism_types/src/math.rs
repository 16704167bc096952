//! # Geometry Types
//!
//! Minimal spatial types the engine needs: positions, observer poses and the
//! axis-aligned volumes used to scope position analytics to an area. All of
//! the heavy geometry (raycasting, collider math) lives behind the scene
//! capability and is out of scope here.

use serde::{Deserialize, Serialize};

/// A 3D position in scene space.
///
/// Uses double-precision floating point so large scenes do not accumulate
/// noticeable positional error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    /// X coordinate (typically east-west axis)
    pub x: f64,
    /// Y coordinate (typically vertical axis)
    pub y: f64,
    /// Z coordinate (typically north-south axis)
    pub z: f64,
}

impl Vec3 {
    /// Creates a new position with the specified coordinates.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Component-wise average of a set of positions. Returns the origin for
    /// an empty set.
    pub fn average(points: &[Vec3]) -> Vec3 {
        if points.is_empty() {
            return Vec3::default();
        }
        let mut total = Vec3::default();
        for p in points {
            total.x += p.x;
            total.y += p.y;
            total.z += p.z;
        }
        let n = points.len() as f64;
        Vec3::new(total.x / n, total.y / n, total.z / n)
    }
}

/// An orientation expressed as a quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Position and orientation of the observer (camera / HMD).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Rotation,
}

/// Axis-aligned bounding volume for one logical area.
///
/// Seeded as a unit-sized cube at the first placed instance's position and
/// grown (never shrunk) to encapsulate every further placement. Resetting
/// recentres the volume and restores the unit default size, discarding any
/// growth history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaVolume {
    /// Centre of the volume in scene space.
    pub center: Vec3,
    /// Full extent along each axis.
    pub size: Vec3,
}

impl AreaVolume {
    /// Default extent of a freshly seeded or reset volume.
    pub const UNIT_SIZE: f64 = 1.0;

    /// Seeds a unit-sized volume at a point.
    pub fn from_point(point: Vec3) -> Self {
        Self {
            center: point,
            size: Vec3::new(Self::UNIT_SIZE, Self::UNIT_SIZE, Self::UNIT_SIZE),
        }
    }

    /// Grows the volume so it contains `point`. Never shrinks.
    pub fn encapsulate(&mut self, point: Vec3) {
        let (min_x, max_x) = grow_axis(self.center.x, self.size.x, point.x);
        let (min_y, max_y) = grow_axis(self.center.y, self.size.y, point.y);
        let (min_z, max_z) = grow_axis(self.center.z, self.size.z, point.z);

        self.center = Vec3::new(
            (min_x + max_x) / 2.0,
            (min_y + max_y) / 2.0,
            (min_z + max_z) / 2.0,
        );
        self.size = Vec3::new(max_x - min_x, max_y - min_y, max_z - min_z);
    }

    /// True when `point` lies inside the volume (boundary inclusive).
    pub fn contains(&self, point: Vec3) -> bool {
        let hx = self.size.x / 2.0;
        let hy = self.size.y / 2.0;
        let hz = self.size.z / 2.0;
        (point.x - self.center.x).abs() <= hx
            && (point.y - self.center.y).abs() <= hy
            && (point.z - self.center.z).abs() <= hz
    }

    /// True when a sphere at `point` with `radius` touches the volume.
    pub fn overlaps_sphere(&self, point: Vec3, radius: f64) -> bool {
        let hx = self.size.x / 2.0;
        let hy = self.size.y / 2.0;
        let hz = self.size.z / 2.0;
        let cx = (point.x - self.center.x).abs().max(0.0) - hx;
        let cy = (point.y - self.center.y).abs().max(0.0) - hy;
        let cz = (point.z - self.center.z).abs().max(0.0) - hz;
        let dx = cx.max(0.0);
        let dy = cy.max(0.0);
        let dz = cz.max(0.0);
        dx * dx + dy * dy + dz * dz <= radius * radius
    }
}

fn grow_axis(center: f64, size: f64, point: f64) -> (f64, f64) {
    let half = size / 2.0;
    let min = (center - half).min(point);
    let max = (center + half).max(point);
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.distance(&b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn encapsulate_grows_but_never_shrinks() {
        let mut volume = AreaVolume::from_point(Vec3::new(0.0, 0.0, 0.0));
        volume.encapsulate(Vec3::new(2.0, 0.0, 0.0));
        volume.encapsulate(Vec3::new(0.0, 0.0, 2.0));

        assert!(volume.size.x >= 2.0);
        assert!(volume.size.z >= 2.0);

        // Re-encapsulating an interior point changes nothing.
        let before = volume;
        volume.encapsulate(Vec3::new(0.5, 0.0, 0.5));
        assert_eq!(before, volume);
    }

    #[test]
    fn contains_is_boundary_inclusive() {
        let volume = AreaVolume::from_point(Vec3::new(0.0, 0.0, 0.0));
        assert!(volume.contains(Vec3::new(0.5, 0.0, 0.0)));
        assert!(!volume.contains(Vec3::new(0.6, 0.0, 0.0)));
    }

    #[test]
    fn sphere_overlap_reaches_past_the_face() {
        let volume = AreaVolume::from_point(Vec3::new(0.0, 0.0, 0.0));
        assert!(volume.overlaps_sphere(Vec3::new(0.55, 0.0, 0.0), 0.1));
        assert!(!volume.overlaps_sphere(Vec3::new(2.0, 0.0, 0.0), 0.1));
    }

    #[test]
    fn average_of_three_instances() {
        let avg = Vec3::average(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
        ]);
        assert!((avg.x - 2.0 / 3.0).abs() < 1e-9);
        assert!((avg.z - 2.0 / 3.0).abs() < 1e-9);
    }
}
