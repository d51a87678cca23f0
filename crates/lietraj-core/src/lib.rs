//! Core math and geometry primitives for `lietraj`.
//!
//! This crate provides the building blocks used by the other crates in the
//! workspace:
//!
//! - linear algebra type aliases (`Real`, `Vec3`, `Quat`, `Iso3`, ...),
//! - SO(3) exponential and logarithm maps that stay differentiable at the
//!   identity for any [`nalgebra::RealField`] (including dual numbers),
//! - timestamped pose and IMU samples,
//! - uniform cumulative B-splines whose knots live on SO(3) x R³.
//!
//! # Modules
//!
//! - \[`math`\]: type aliases.
//! - [`lie`]: generic SO(3) exp/log.
//! - [`spline`]: knot storage, time indexing, evaluation and rigid transforms.
//!
//! # Example
//!
//! ```no_run
//! use lietraj_core::{Iso3, PoseSpline};
//!
//! let mut spline = PoseSpline::new(3, 0.2, 0.0, 2.0).unwrap();
//! spline.set_knot(4, Iso3::translation(1.0, 0.0, 0.0)).unwrap();
//! let pose = spline.pose(0.5).unwrap();
//! println!("{:?}", pose.translation);
//! ```

/// Linear algebra type aliases.
mod math;
/// Timestamped pose and IMU samples.
mod types;

pub mod lie;
pub mod spline;

pub use math::*;
pub use spline::{PoseSampling, PoseSpline, SplineBasis, SplineError, SplineSegment};
pub use types::*;
