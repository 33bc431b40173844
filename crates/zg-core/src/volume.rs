use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A spherical region of space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Center of the sphere in world space.
    pub center: Vec3,
    /// Radius in world units.
    pub radius: f32,
}

impl Sphere {
    /// Create a sphere from center and radius.
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Whether a point lies inside or on the sphere.
    ///
    /// Compares squared distances, so points exactly on the surface count
    /// as contained.
    pub fn contains(&self, point: Vec3) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }
}
