use lietraj_core::lie::{quat_from_xyzw, scalar, so3_log};
use lietraj_core::SplineBasis;
use nalgebra::{DVector, Quaternion, RealField, UnitQuaternion, Vector3};

/// Pose residual for one measurement.
///
/// `so3_knots` and `pos_knots` are the window blocks; either may be empty when
/// that component is not measured. The rotation part comes first:
/// `[rot_weight * log(R_meas^-1 R(t)); pos_weight * (p(t) - p_meas)]`.
#[allow(clippy::too_many_arguments)]
pub fn se3_pose_residual_generic<T: RealField>(
    so3_knots: &[DVector<T>],
    pos_knots: &[DVector<T>],
    basis: &SplineBasis,
    u: f64,
    rotation_xyzw: [f64; 4],
    translation: [f64; 3],
    rot_weight: f64,
    pos_weight: f64,
) -> DVector<T> {
    let mut residual = Vec::with_capacity(6);

    if !so3_knots.is_empty() {
        let knots: Vec<UnitQuaternion<T>> =
            so3_knots.iter().map(|k| quat_from_xyzw(k.as_view())).collect();
        let rotation = basis.evaluate_so3(&knots, u);
        let measured = UnitQuaternion::new_unchecked(Quaternion::new(
            scalar::<T>(rotation_xyzw[3]),
            scalar::<T>(rotation_xyzw[0]),
            scalar::<T>(rotation_xyzw[1]),
            scalar::<T>(rotation_xyzw[2]),
        ));
        let r = so3_log(&(measured.inverse() * rotation)) * scalar::<T>(rot_weight);
        residual.extend(r.iter().cloned());
    }

    if !pos_knots.is_empty() {
        let knots: Vec<Vector3<T>> = pos_knots
            .iter()
            .map(|k| Vector3::new(k[0].clone(), k[1].clone(), k[2].clone()))
            .collect();
        let position = basis.evaluate_rd(&knots, u, 1.0, 0);
        let measured = Vector3::new(
            scalar::<T>(translation[0]),
            scalar::<T>(translation[1]),
            scalar::<T>(translation[2]),
        );
        let r = (position - measured) * scalar::<T>(pos_weight);
        residual.extend(r.iter().cloned());
    }

    DVector::from_vec(residual)
}
