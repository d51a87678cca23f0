use std::f64::consts::TAU;

use lietraj_core::{Iso3, Mat3, Pose, Quat, Real, Vec3};
use nalgebra::{Rotation3, Vector3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Time interval a profile is generated over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: Real,
    pub end: Real,
}

impl TimeSpan {
    pub fn new(start: Real, end: Real) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Real {
        self.end - self.start
    }
}

/// Reference motions.
///
/// Rotating profiles keep the body y-axis pointing at the vertical axis
/// through the origin and the x-axis along the horizontal direction of travel.
/// Translating profiles point x along the travel direction with y horizontal.
#[derive(Debug, Clone)]
pub enum MotionProfile {
    /// `p = (R cos t, R sin t, 0)`.
    Circular { radius: Real },
    /// Circular with `z = t / 2π * height_each_circle`.
    Spiral {
        radius: Real,
        height_each_circle: Real,
    },
    /// Circular with `z = sin(2π t) * height`.
    Wave { radius: Real, height: Real },
    /// Constant velocity from `from` at the span start to `to` at the span end.
    UniformLinear { from: Vec3, to: Vec3 },
    /// Constant acceleration from rest at `from` to `to` at the span end.
    UniformAccelerated { from: Vec3, to: Vec3 },
    /// Seeded random walk; each evaluation advances the walk.
    Drunkard(DrunkardWalk),
}

impl MotionProfile {
    /// Pose at time `t`.
    ///
    /// Closed-form profiles are pure functions of `t`. The random walk ignores
    /// `t` apart from stamping it onto the next step of the walk.
    pub fn pose_at(&mut self, t: Real, span: &TimeSpan) -> Pose {
        match self {
            MotionProfile::Circular { radius } => {
                let p = Vec3::new(*radius * t.cos(), *radius * t.sin(), 0.0);
                Pose::new(facing_center(&p), p, t)
            }
            MotionProfile::Spiral {
                radius,
                height_each_circle,
            } => {
                let p = Vec3::new(
                    *radius * t.cos(),
                    *radius * t.sin(),
                    t / TAU * *height_each_circle,
                );
                Pose::new(facing_center(&p), p, t)
            }
            MotionProfile::Wave { radius, height } => {
                let p = Vec3::new(
                    *radius * t.cos(),
                    *radius * t.sin(),
                    (TAU * t).sin() * *height,
                );
                Pose::new(facing_center(&p), p, t)
            }
            MotionProfile::UniformLinear { from, to } => {
                let s = (t - span.start) / span.duration();
                let p = *from + (*to - *from) * s;
                Pose::new(heading(&(*to - *from)), p, t)
            }
            MotionProfile::UniformAccelerated { from, to } => {
                let d = span.duration();
                let acc = (*to - *from) * (2.0 / (d * d));
                let elapsed = t - span.start;
                let p = *from + acc * (0.5 * elapsed * elapsed);
                Pose::new(heading(&(*to - *from)), p, t)
            }
            MotionProfile::Drunkard(walk) => walk.step(t),
        }
    }

    /// Whether successive evaluations depend on earlier ones.
    pub fn is_stateful(&self) -> bool {
        matches!(self, MotionProfile::Drunkard(_))
    }
}

/// Random walk with bounded per-step translation and rotation.
///
/// Each step adds a uniform offset in `[-max_stride, max_stride]` per axis and
/// left-multiplies the orientation by `Rx(γ) Ry(β) Rz(α)`, with the angles
/// drawn uniformly in `[-max_angle, max_angle]` in z, y, x order.
#[derive(Debug, Clone)]
pub struct DrunkardWalk {
    rng: StdRng,
    last: Iso3,
    max_stride: Real,
    max_angle: Real,
}

impl DrunkardWalk {
    /// `max_angle_deg` is in degrees. Negative bounds are treated as zero.
    pub fn new(origin: Vec3, max_stride: Real, max_angle_deg: Real, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            last: Iso3::translation(origin.x, origin.y, origin.z),
            max_stride: max_stride.max(0.0),
            max_angle: max_angle_deg.max(0.0).to_radians(),
        }
    }

    fn step(&mut self, t: Real) -> Pose {
        let s = self.max_stride;
        let stride = Vec3::new(
            self.rng.random_range(-s..=s),
            self.rng.random_range(-s..=s),
            self.rng.random_range(-s..=s),
        );
        let a = self.max_angle;
        let about_z = self.rng.random_range(-a..=a);
        let about_y = self.rng.random_range(-a..=a);
        let about_x = self.rng.random_range(-a..=a);
        let delta = Quat::from_axis_angle(&Vector3::x_axis(), about_x)
            * Quat::from_axis_angle(&Vector3::y_axis(), about_y)
            * Quat::from_axis_angle(&Vector3::z_axis(), about_z);

        self.last.translation.vector += stride;
        self.last.rotation = delta * self.last.rotation;
        Pose::from_iso3(&self.last, t)
    }
}

fn rotation_from_axes(x: &Vec3, y: &Vec3, z: &Vec3) -> Quat {
    let m = Mat3::from_columns(&[*x, *y, *z]);
    Quat::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m))
}

/// y towards the vertical axis, x along the horizontal tangent, z = x × y.
fn facing_center(p: &Vec3) -> Quat {
    let y = -Vec3::new(p.x, p.y, 0.0).normalize();
    let x = Vec3::new(-p.y, p.x, 0.0).normalize();
    let z = x.cross(&y);
    rotation_from_axes(&x, &y, &z)
}

/// x along `direction`, y horizontal, z = x × y.
fn heading(direction: &Vec3) -> Quat {
    let x = direction.normalize();
    let horizontal = Vec3::new(-x.y, x.x, 0.0);
    let y = if horizontal.norm() < 1e-9 {
        Vec3::y()
    } else {
        horizontal.normalize()
    };
    let z = x.cross(&y);
    rotation_from_axes(&x, &y, &z)
}
