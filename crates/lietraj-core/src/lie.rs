//! SO(3) exponential and logarithm maps over any [`RealField`].
//!
//! nalgebra's `from_scaled_axis`/`scaled_axis` branch on the rotation angle and
//! return constants near the identity, which drops the derivative part of dual
//! numbers. The maps here switch to a Taylor expansion instead, so Jacobians
//! stay exact when two spline knots coincide.

use nalgebra::{DVectorView, Quaternion, RealField, UnitQuaternion, Vector3};

/// Below this squared angle the series expansions are used.
const SMALL_ANGLE_SQ: f64 = 1e-10;

#[inline]
pub fn scalar<T: RealField>(v: f64) -> T {
    nalgebra::convert(v)
}

/// Exponential map `so(3) -> SO(3)`.
pub fn so3_exp<T: RealField>(omega: &Vector3<T>) -> UnitQuaternion<T> {
    let theta_sq = omega.norm_squared();
    let (real, imag_factor) = if theta_sq < scalar(SMALL_ANGLE_SQ) {
        let theta_po4 = theta_sq.clone() * theta_sq.clone();
        (
            T::one() - theta_sq.clone() * scalar(1.0 / 8.0) + theta_po4.clone() * scalar(1.0 / 384.0),
            scalar::<T>(0.5) - theta_sq * scalar(1.0 / 48.0) + theta_po4 * scalar(1.0 / 3840.0),
        )
    } else {
        let theta = theta_sq.sqrt();
        let (sin_half, cos_half) = (theta.clone() * scalar(0.5)).sin_cos();
        (cos_half, sin_half / theta)
    };
    UnitQuaternion::new_unchecked(Quaternion::from_parts(real, omega * imag_factor))
}

/// Logarithm map `SO(3) -> so(3)`, returning a rotation vector with angle in `[0, π]`.
pub fn so3_log<T: RealField>(q: &UnitQuaternion<T>) -> Vector3<T> {
    let (w, v) = if q.scalar() < T::zero() {
        (-q.scalar(), -q.imag())
    } else {
        (q.scalar(), q.imag())
    };
    let n_sq = v.norm_squared();
    let factor = if n_sq < scalar(SMALL_ANGLE_SQ) {
        // 2 atan(n / w) / n ≈ 2 / w - 2 n² / (3 w³)
        let w_cubed = w.clone() * w.clone() * w.clone();
        scalar::<T>(2.0) / w - scalar::<T>(2.0 / 3.0) * n_sq / w_cubed
    } else {
        let n = n_sq.sqrt();
        scalar::<T>(2.0) * n.clone().atan2(w) / n
    };
    v * factor
}

/// Reads a `[qx, qy, qz, qw]` parameter block as a unit quaternion.
///
/// The block is renormalized, which keeps the map differentiable when the
/// solver evaluates slightly off-manifold values.
pub fn quat_from_xyzw<T: RealField>(x: DVectorView<'_, T>) -> UnitQuaternion<T> {
    debug_assert_eq!(x.len(), 4);
    UnitQuaternion::from_quaternion(Quaternion::new(
        x[3].clone(),
        x[0].clone(),
        x[1].clone(),
        x[2].clone(),
    ))
}
