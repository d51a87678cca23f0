//! Parameter block packing for trajectory problems.
//!
//! Each parameter type provides a conversion to and from the `DVector`
//! storage used by the optimization backends.
//!
//! - [`so3`] - quaternion and translation blocks of spline knots
//! - [`gyro`] - gyroscope bias and upper-triangular scale/misalignment map

pub mod gyro;
pub mod so3;
