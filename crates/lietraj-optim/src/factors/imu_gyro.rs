use lietraj_core::lie::{quat_from_xyzw, scalar};
use lietraj_core::SplineBasis;
use nalgebra::{DVector, DVectorView, RealField, UnitQuaternion, Vector3};

use crate::params::gyro::gyro_map_matrix;

/// Gyroscope residual `w * (M * (R_s2b * ω(t)) + b - gyro)`.
///
/// `ω(t)` is the body-frame angular velocity of the rotation spline defined by
/// `so3_knots`. `map_coeff` holds the six upper-triangular entries of `M`.
#[allow(clippy::too_many_arguments)]
pub fn gyro_residual_generic<T: RealField>(
    so3_knots: &[DVector<T>],
    bias: DVectorView<'_, T>,
    map_coeff: DVectorView<'_, T>,
    sensor_to_body: DVectorView<'_, T>,
    basis: &SplineBasis,
    u: f64,
    inv_dt: f64,
    gyro: [f64; 3],
    w: f64,
) -> Vector3<T> {
    debug_assert_eq!(bias.len(), 3);
    let knots: Vec<UnitQuaternion<T>> =
        so3_knots.iter().map(|k| quat_from_xyzw(k.as_view())).collect();
    let (_, omega) = basis.evaluate_so3_velocity(&knots, u, inv_dt);

    let map = gyro_map_matrix(map_coeff);
    let rotation = quat_from_xyzw(sensor_to_body);
    let bias = Vector3::new(bias[0].clone(), bias[1].clone(), bias[2].clone());
    let measured = Vector3::new(
        scalar::<T>(gyro[0]),
        scalar::<T>(gyro[1]),
        scalar::<T>(gyro[2]),
    );

    (map * rotation.transform_vector(&omega) + bias - measured) * scalar::<T>(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::gyro::GyroIntrinsics;
    use crate::params::so3::quat_to_dvec;
    use lietraj_core::{Quat, Vec3};

    fn window() -> Vec<Quat> {
        (0..4)
            .map(|i| Quat::from_euler_angles(0.05 * i as f64, 0.1 * i as f64, -0.2 * i as f64))
            .collect()
    }

    #[test]
    fn residual_zero_for_ideal_sensor() {
        let basis = SplineBasis::new(3);
        let knots = window();
        let (_, omega) = basis.evaluate_so3_velocity(&knots, 0.6, 5.0);
        let intr = GyroIntrinsics::default();

        let so3: Vec<DVector<f64>> = knots.iter().map(quat_to_dvec).collect();
        let r = gyro_residual_generic(
            &so3,
            intr.bias_to_dvec().as_view(),
            intr.map_to_dvec().as_view(),
            quat_to_dvec(&Quat::identity()).as_view(),
            &basis,
            0.6,
            5.0,
            [omega.x, omega.y, omega.z],
            1.0,
        );
        assert!(r.norm() < 1e-12, "residual {r}");
    }

    #[test]
    fn residual_applies_map_bias_and_weight() {
        let basis = SplineBasis::new(3);
        let knots = window();
        let (_, omega) = basis.evaluate_so3_velocity(&knots, 0.2, 5.0);
        let map = lietraj_core::Mat3::new(1.1, 0.05, 0.0, 0.0, 0.9, -0.02, 0.0, 0.0, 1.0);
        let bias = Vec3::new(0.01, -0.02, 0.03);
        let intr = GyroIntrinsics::from_matrix(bias, &map).unwrap();
        let ext = Quat::from_euler_angles(0.0, 0.0, 0.5);

        let gyro = map * (ext * omega) + bias;
        let so3: Vec<DVector<f64>> = knots.iter().map(quat_to_dvec).collect();
        let r = gyro_residual_generic(
            &so3,
            intr.bias_to_dvec().as_view(),
            intr.map_to_dvec().as_view(),
            quat_to_dvec(&ext).as_view(),
            &basis,
            0.2,
            5.0,
            [gyro.x + 0.1, gyro.y, gyro.z],
            3.0,
        );
        assert!((r - Vec3::new(-0.3, 0.0, 0.0)).norm() < 1e-12, "residual {r}");
    }
}
