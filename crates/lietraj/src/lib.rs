//! High-level entry crate for `lietraj`.
//!
//! Re-exports the three layers of the workspace:
//!
//! - [`core`]: the uniform pose B-spline, its basis and timing, and the
//!   `Pose` / `ImuFrame` measurement types.
//! - [`optim`]: the trajectory estimator that fits spline knots (and,
//!   optionally, gyroscope intrinsics) to pose and gyro measurements.
//! - [`sim`]: closed-form and random-walk motion generators that produce
//!   sampled ground truth together with a fitted spline.
//!
//! ```no_run
//! use lietraj::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let truth = SimuTrajectory::circular(1.0, &SimuConfig::default())?;
//!
//! let mut spline = PoseSpline::new(3, 0.2, 0.0, 6.0)?;
//! spline.seed_from_poses(truth.pose_sequence())?;
//! let mut estimator = TrajectoryEstimator::new(&spline);
//! for pose in truth.pose_sequence().iter().filter(|p| p.timestamp < 6.0) {
//!     estimator.add_se3_measurement(pose, Se3Components::Full, 1.0, 1.0)?;
//! }
//! let summary = estimator.solve(&mut spline, &BackendSolveOptions::default())?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

/// Spline, Lie-group helpers and measurement types.
pub mod core {
    pub use lietraj_core::*;
}

/// Trajectory estimation: problem IR, factors and solver backend.
pub mod optim {
    pub use lietraj_optim::*;
}

/// Synthetic motion generators.
pub mod sim {
    pub use lietraj_sim::*;
}

/// Convenient re-exports of the most used types.
pub mod prelude {
    pub use crate::core::{ImuFrame, Iso3, Pose, PoseSpline, Quat, Real, SplineError, Vec3};

    pub use crate::optim::backend::BackendSolveOptions;
    pub use crate::optim::ir::{RobustLoss, Se3Components};
    pub use crate::optim::{EstimatorOptions, GyroIntrinsics, SolveSummary, TrajectoryEstimator};

    pub use crate::sim::{MotionProfile, SimuConfig, SimuTrajectory, TimeSpan};
}
