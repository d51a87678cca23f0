//! Synthetic reference trajectories for `lietraj`.
//!
//! A [`MotionProfile`] evaluates a closed-form (or random-walk) pose at any
//! time. [`SimuTrajectory`] samples a profile at a fixed rate and immediately
//! fits a [`lietraj_core::PoseSpline`] to the samples, so the result carries
//! both the discrete ground truth and its continuous-time approximation.
//!
//! # Example
//!
//! ```no_run
//! use lietraj_sim::{SimuConfig, SimuTrajectory};
//!
//! # fn main() -> anyhow::Result<()> {
//! let circle = SimuTrajectory::circular(1.0, &SimuConfig::default())?;
//! let omega = circle.spline().angular_velocity(1.0)?;
//! println!("{} samples, ω(1) = {omega}", circle.pose_sequence().len());
//! # Ok(())
//! # }
//! ```

mod motion;
mod simulation;

pub use motion::{DrunkardWalk, MotionProfile, TimeSpan};
pub use simulation::{SimuConfig, SimuTrajectory};
