use serde::{Deserialize, Serialize};

use crate::{Iso3, Quat, Real, Vec3};

/// A rigid pose sampled at a point in time.
///
/// `rotation` and `translation` map body coordinates into the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Quat,
    pub translation: Vec3,
    pub timestamp: Real,
}

impl Pose {
    pub fn new(rotation: Quat, translation: Vec3, timestamp: Real) -> Self {
        Self {
            rotation,
            translation,
            timestamp,
        }
    }

    pub fn identity(timestamp: Real) -> Self {
        Self::new(Quat::identity(), Vec3::zeros(), timestamp)
    }

    pub fn from_iso3(iso: &Iso3, timestamp: Real) -> Self {
        Self::new(iso.rotation, iso.translation.vector, timestamp)
    }

    pub fn to_iso3(&self) -> Iso3 {
        Iso3::from_parts(self.translation.into(), self.rotation)
    }

    /// Returns `transform * self`, keeping the timestamp.
    pub fn left_transformed(&self, transform: &Iso3) -> Self {
        Self::from_iso3(&(transform * self.to_iso3()), self.timestamp)
    }

    /// Returns `self * transform`, keeping the timestamp.
    pub fn right_transformed(&self, transform: &Iso3) -> Self {
        Self::from_iso3(&(self.to_iso3() * transform), self.timestamp)
    }

    /// Returns the inverse pose, keeping the timestamp.
    pub fn inverse(&self) -> Self {
        Self::from_iso3(&self.to_iso3().inverse(), self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_keep_timestamp() {
        let pose = Pose::new(
            Quat::from_euler_angles(0.1, -0.2, 0.3),
            Vec3::new(1.0, 2.0, 3.0),
            4.5,
        );
        let t = Iso3::translation(0.5, 0.0, -1.0);

        assert_eq!(pose.left_transformed(&t).timestamp, 4.5);
        assert_eq!(pose.right_transformed(&t).timestamp, 4.5);

        let back = pose.inverse().inverse();
        assert!((back.translation - pose.translation).norm() < 1e-12);
        assert!(back.rotation.angle_to(&pose.rotation) < 1e-12);
    }

    #[test]
    fn left_transform_moves_translation() {
        let pose = Pose::identity(0.0);
        let moved = pose.left_transformed(&Iso3::translation(1.0, 0.0, 0.0));
        assert!((moved.translation - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    }
}
