//! Non-linear trajectory estimation built on tiny-solver.
//!
//! Measurements against a [`lietraj_core::PoseSpline`] are collected into a
//! backend-independent [`ir::ProblemIR`], compiled into a tiny-solver problem
//! and solved with Levenberg-Marquardt. SO(3) knots are updated on the
//! manifold through [`backend::So3Manifold`].
//!
//! # Example
//!
//! ```no_run
//! use lietraj_core::{Pose, PoseSpline};
//! use lietraj_optim::backend::BackendSolveOptions;
//! use lietraj_optim::ir::Se3Components;
//! use lietraj_optim::TrajectoryEstimator;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut spline = PoseSpline::new(3, 0.2, 0.0, 2.0)?;
//! let poses: Vec<Pose> = Vec::new();
//! let mut estimator = TrajectoryEstimator::new(&spline);
//! for pose in &poses {
//!     estimator.add_se3_measurement(pose, Se3Components::Full, 1.0, 1.0)?;
//! }
//! let summary = estimator.solve(&mut spline, &BackendSolveOptions::default())?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod estimator;
pub mod factors;
pub mod ir;
pub mod params;

pub use estimator::{EstimatorOptions, SolveSummary, TrajectoryEstimator};
pub use params::gyro::GyroIntrinsics;
