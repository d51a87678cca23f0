//! Residual factor implementations with automatic differentiation support.
//!
//! Every measurement factor reads one spline window of `order + 1` consecutive knots and
//! evaluates the spline through [`lietraj_core::SplineBasis`]. The residual
//! functions are generic over [`nalgebra::RealField`] so tiny-solver can
//! evaluate them with `f64` and with dual numbers.
//!
//! # Design Pattern
//!
//! ```rust,ignore
//! pub fn my_factor_generic<T: RealField>(
//!     so3_knots: &[DVector<T>],
//!     aux: DVectorView<'_, T>,
//!     basis: &SplineBasis,
//!     u: f64,
//!     measurement: [f64; N],
//! ) -> DVector<T> {
//!     let knots: Vec<_> = so3_knots.iter().map(|k| quat_from_xyzw(k.as_view())).collect();
//!     let rotation = basis.evaluate_so3(&knots, u);
//!     // ...
//! }
//! ```
//!
//! - Read quaternion blocks with [`lietraj_core::lie::quat_from_xyzw`]
//! - Use [`lietraj_core::lie::so3_exp`]/[`so3_log`](lietraj_core::lie::so3_log)
//!   instead of nalgebra's scaled-axis helpers, which lose derivatives at the identity
//! - Convert constants with [`lietraj_core::lie::scalar`]
//!
//! # Available Factors
//!
//! - [`se3_pose`] - spline pose against a measured pose
//! - [`imu_gyro`] - spline angular velocity against a gyroscope reading
//! - [`knot_prior`] - single rotation knot against a reference rotation

pub mod imu_gyro;
pub mod knot_prior;
pub mod se3_pose;
