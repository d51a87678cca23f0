use std::num::NonZero;

use lietraj_core::lie::{quat_from_xyzw, so3_exp, so3_log};
use nalgebra as na;

use tiny_solver::manifold::{AutoDiffManifold, Manifold};

/// Rotation manifold SO(3) stored as a unit quaternion.
///
/// State (ambient): 4, `[qx, qy, qz, qw]`
/// Tangent: 3
///
/// `plus(x, δ) = x * exp(δ)` and `minus(y, x) = log(x^-1 * y)`, so tangent
/// increments are expressed in the local (body) frame of `x`.
#[derive(Debug, Clone, Copy, Default)]
pub struct So3Manifold;

impl<T: na::RealField> AutoDiffManifold<T> for So3Manifold {
    fn plus(&self, x: na::DVectorView<T>, delta: na::DVectorView<T>) -> na::DVector<T> {
        debug_assert_eq!(x.len(), 4);
        debug_assert_eq!(delta.len(), 3);
        let d = na::Vector3::new(delta[0].clone(), delta[1].clone(), delta[2].clone());
        let q = quat_from_xyzw(x) * so3_exp(&d);
        let c = q.into_inner().coords;
        na::dvector![c[0].clone(), c[1].clone(), c[2].clone(), c[3].clone()]
    }

    fn minus(&self, y: na::DVectorView<T>, x: na::DVectorView<T>) -> na::DVector<T> {
        debug_assert_eq!(y.len(), 4);
        debug_assert_eq!(x.len(), 4);
        let d = so3_log(&(quat_from_xyzw(x).inverse() * quat_from_xyzw(y)));
        na::dvector![d[0].clone(), d[1].clone(), d[2].clone()]
    }
}

impl Manifold for So3Manifold {
    fn tangent_size(&self) -> NonZero<usize> {
        NonZero::new(3).unwrap()
    }
}
