use lietraj_core::lie::{quat_from_xyzw, scalar, so3_log};
use nalgebra::{DVectorView, Quaternion, RealField, UnitQuaternion, Vector3};

/// Rotation prior `weight * log(R_ref^-1 R_knot)` on a single knot block.
pub fn rotation_prior_residual_generic<T: RealField>(
    knot: DVectorView<'_, T>,
    rotation_xyzw: [f64; 4],
    weight: f64,
) -> Vector3<T> {
    let rotation = quat_from_xyzw(knot);
    let reference = UnitQuaternion::new_unchecked(Quaternion::new(
        scalar::<T>(rotation_xyzw[3]),
        scalar::<T>(rotation_xyzw[0]),
        scalar::<T>(rotation_xyzw[1]),
        scalar::<T>(rotation_xyzw[2]),
    ));
    so3_log(&(reference.inverse() * rotation)) * scalar::<T>(weight)
}
