//! Knot parameter conversions for tiny-solver.

use anyhow::{ensure, Result};
use lietraj_core::{Quat, Vec3};
use nalgebra::{DVector, DVectorView, Quaternion, UnitQuaternion};

/// Convert a rotation into a 4D block `[qx, qy, qz, qw]`.
pub fn quat_to_dvec(q: &Quat) -> DVector<f64> {
    let c = q.quaternion().coords;
    nalgebra::dvector![c[0], c[1], c[2], c[3]]
}

/// Convert a 4D block `[qx, qy, qz, qw]` into a normalized rotation.
pub fn dvec_to_quat(v: DVectorView<'_, f64>) -> Result<Quat> {
    ensure!(
        v.len() == 4,
        "expected quaternion vector of length 4, got {}",
        v.len()
    );
    let quat = Quaternion::new(v[3], v[0], v[1], v[2]);
    ensure!(
        quat.norm() > f64::EPSILON,
        "quaternion block has zero norm"
    );
    Ok(UnitQuaternion::from_quaternion(quat))
}

pub fn vec3_to_dvec(v: &Vec3) -> DVector<f64> {
    nalgebra::dvector![v.x, v.y, v.z]
}

pub fn dvec_to_vec3(v: DVectorView<'_, f64>) -> Result<Vec3> {
    ensure!(v.len() == 3, "expected vector of length 3, got {}", v.len());
    Ok(Vec3::new(v[0], v[1], v[2]))
}
