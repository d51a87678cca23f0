//! Uniform cumulative B-splines on SO(3) x R³.
//!
//! Knots are rigid transforms at uniform spacing `dt`. The rotation part is
//! blended on the Lie algebra,
//! `R(t) = R_0 * prod_j exp(λ_j(u) * log(R_{j-1}^-1 R_j))`, and the
//! translation part uses the same cumulative weights on Euclidean differences.
//! Both share the time indexing of [`SplineSegment`].

mod basis;
mod sampling;
mod segment;

use std::ops::{Mul, Not};

use thiserror::Error;

use crate::{Iso3, Pose, Quat, Real, Vec3};

pub use basis::SplineBasis;
pub use sampling::PoseSampling;
pub use segment::SplineSegment;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplineError {
    #[error("spline order must be at least 1")]
    InvalidOrder,
    #[error("knot spacing must be positive and finite, got {0}")]
    NonPositiveDt(Real),
    #[error("invalid time interval [{start}, {end})")]
    InvalidInterval { start: Real, end: Real },
    #[error("time {t} outside spline range [{min}, {max})")]
    OutOfRange { t: Real, min: Real, max: Real },
    #[error("knot index {index} out of range ({len} knots)")]
    KnotIndex { index: usize, len: usize },
    #[error("sampling step must be positive and finite, got {0}")]
    NonPositiveStep(Real),
    #[error("cannot seed knots from an empty pose sequence")]
    EmptyPoses,
}

/// Uniform B-spline of degree `order` with pose-valued knots.
///
/// The valid time range is `[min_time, max_time)`; every query inside it reads
/// exactly `order + 1` consecutive knots.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSpline {
    segment: SplineSegment,
    basis: SplineBasis,
    knots: Vec<Iso3>,
}

impl PoseSpline {
    /// Creates a spline covering at least `[start_time, end_time)` with identity knots.
    pub fn new(
        order: usize,
        dt: Real,
        start_time: Real,
        end_time: Real,
    ) -> Result<Self, SplineError> {
        if order == 0 {
            return Err(SplineError::InvalidOrder);
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SplineError::NonPositiveDt(dt));
        }
        if !(start_time.is_finite() && end_time.is_finite() && end_time > start_time) {
            return Err(SplineError::InvalidInterval {
                start: start_time,
                end: end_time,
            });
        }

        let num_segments = (((end_time - start_time) / dt).ceil() as usize).max(1);
        let num_knots = num_segments + order;
        Ok(Self {
            segment: SplineSegment {
                start_time,
                dt,
                num_knots,
                order,
            },
            basis: SplineBasis::new(order),
            knots: vec![Iso3::identity(); num_knots],
        })
    }

    pub fn order(&self) -> usize {
        self.segment.order
    }

    pub fn dt(&self) -> Real {
        self.segment.dt
    }

    pub fn start_time(&self) -> Real {
        self.segment.start_time
    }

    pub fn min_time(&self) -> Real {
        self.segment.min_time()
    }

    /// Exclusive end of the valid time range.
    pub fn max_time(&self) -> Real {
        self.segment.max_time()
    }

    pub fn num_knots(&self) -> usize {
        self.knots.len()
    }

    pub fn knots(&self) -> &[Iso3] {
        &self.knots
    }

    /// Timestamp associated with knot `index`.
    pub fn knot_time(&self, index: usize) -> Real {
        self.segment.start_time + index as Real * self.segment.dt
    }

    pub fn knot(&self, index: usize) -> Result<Iso3, SplineError> {
        self.knots
            .get(index)
            .copied()
            .ok_or(SplineError::KnotIndex {
                index,
                len: self.knots.len(),
            })
    }

    pub fn set_knot(&mut self, index: usize, knot: Iso3) -> Result<(), SplineError> {
        let len = self.knots.len();
        let slot = self
            .knots
            .get_mut(index)
            .ok_or(SplineError::KnotIndex { index, len })?;
        *slot = knot;
        Ok(())
    }

    pub fn segment(&self) -> SplineSegment {
        self.segment
    }

    pub fn basis(&self) -> &SplineBasis {
        &self.basis
    }

    /// First knot of the window read at `t` and the normalized offset `u ∈ [0, 1)`.
    pub fn compute_spline_index(&self, t: Real) -> Result<(usize, Real), SplineError> {
        self.segment.compute_spline_index(t)
    }

    pub fn pose(&self, t: Real) -> Result<Pose, SplineError> {
        let (window, u) = self.window(t)?;
        let rotation = self.basis.evaluate_so3(&rotations(window), u);
        let translation = self
            .basis
            .evaluate_rd(&translations(window), u, self.segment.inv_dt(), 0);
        Ok(Pose::new(rotation, translation, t))
    }

    pub fn rotation(&self, t: Real) -> Result<Quat, SplineError> {
        let (window, u) = self.window(t)?;
        Ok(self.basis.evaluate_so3(&rotations(window), u))
    }

    pub fn position(&self, t: Real) -> Result<Vec3, SplineError> {
        self.translation_derivative(t, 0)
    }

    /// Angular velocity in the body frame, `R(t)^T dR/dt = [ω]x`.
    pub fn angular_velocity(&self, t: Real) -> Result<Vec3, SplineError> {
        let (window, u) = self.window(t)?;
        let (_, omega) =
            self.basis
                .evaluate_so3_velocity(&rotations(window), u, self.segment.inv_dt());
        Ok(omega)
    }

    /// Linear velocity in the world frame.
    pub fn linear_velocity(&self, t: Real) -> Result<Vec3, SplineError> {
        self.translation_derivative(t, 1)
    }

    /// Linear acceleration in the world frame.
    pub fn linear_acceleration(&self, t: Real) -> Result<Vec3, SplineError> {
        self.translation_derivative(t, 2)
    }

    /// Iterates poses from `min_time` in increments of `time_step`.
    pub fn sampling(&self, time_step: Real) -> Result<PoseSampling<'_>, SplineError> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(SplineError::NonPositiveStep(time_step));
        }
        Ok(PoseSampling::new(self, time_step))
    }

    /// Sets every knot to the pose whose timestamp is closest to the knot's
    /// centre of influence (see [`knot_centre`](Self::knot_centre)).
    ///
    /// Used to initialize the spline before fitting it to the same poses.
    pub fn seed_from_poses(&mut self, poses: &[Pose]) -> Result<(), SplineError> {
        if poses.is_empty() {
            return Err(SplineError::EmptyPoses);
        }
        self.seed_with(|t| {
            poses
                .iter()
                .min_by(|a, b| (a.timestamp - t).abs().total_cmp(&(b.timestamp - t).abs()))
                .map(Pose::to_iso3)
                .unwrap_or_else(Iso3::identity)
        });
        Ok(())
    }

    /// Sets knot `i` to `pose_at(knot_centre(i))`.
    pub fn seed_with(&mut self, mut pose_at: impl FnMut(Real) -> Iso3) {
        for index in 0..self.knots.len() {
            let centre = self.knot_centre(index);
            self.knots[index] = pose_at(centre);
        }
    }

    /// Time at which knot `index` has its largest influence,
    /// `start + (index - (order - 1) / 2) * dt`.
    pub fn knot_centre(&self, index: usize) -> Real {
        let offset = (self.order() as Real - 1.0) / 2.0;
        self.start_time() + (index as Real - offset) * self.dt()
    }

    /// Replaces every knot `K` with `transform * K`.
    pub fn left_multiply(&mut self, transform: &Iso3) {
        for knot in &mut self.knots {
            *knot = transform * *knot;
        }
    }

    /// Replaces every knot `K` with `K * transform`.
    pub fn right_multiply(&mut self, transform: &Iso3) {
        for knot in &mut self.knots {
            *knot *= transform;
        }
    }

    /// Replaces every knot with its inverse.
    pub fn invert(&mut self) {
        for knot in &mut self.knots {
            *knot = knot.inverse();
        }
    }

    fn window(&self, t: Real) -> Result<(&[Iso3], Real), SplineError> {
        let (range, u) = self.segment.window(t)?;
        Ok((&self.knots[range], u))
    }

    fn translation_derivative(&self, t: Real, derivative: usize) -> Result<Vec3, SplineError> {
        let (window, u) = self.window(t)?;
        Ok(self
            .basis
            .evaluate_rd(&translations(window), u, self.segment.inv_dt(), derivative))
    }
}

fn rotations(window: &[Iso3]) -> Vec<Quat> {
    window.iter().map(|k| k.rotation).collect()
}

fn translations(window: &[Iso3]) -> Vec<Vec3> {
    window.iter().map(|k| k.translation.vector).collect()
}

impl Mul<Iso3> for PoseSpline {
    type Output = PoseSpline;

    fn mul(mut self, rhs: Iso3) -> PoseSpline {
        self.right_multiply(&rhs);
        self
    }
}

impl Mul<PoseSpline> for Iso3 {
    type Output = PoseSpline;

    fn mul(self, mut rhs: PoseSpline) -> PoseSpline {
        rhs.left_multiply(&self);
        rhs
    }
}

impl Not for PoseSpline {
    type Output = PoseSpline;

    fn not(mut self) -> PoseSpline {
        self.invert();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Translation3};

    fn make_iso(angles: (Real, Real, Real), t: (Real, Real, Real)) -> Iso3 {
        let rot = Rotation3::from_euler_angles(angles.0, angles.1, angles.2);
        Iso3::from_parts(Translation3::new(t.0, t.1, t.2), rot.into())
    }

    fn wiggly_spline() -> PoseSpline {
        let mut spline = PoseSpline::new(3, 0.25, 0.0, 3.0).unwrap();
        for i in 0..spline.num_knots() {
            let s = i as Real;
            let knot = make_iso(
                (0.3 * (0.7 * s).sin(), -0.2 * s.cos(), 0.4 * s),
                (s.sin(), 0.5 * s, (0.3 * s).cos()),
            );
            spline.set_knot(i, knot).unwrap();
        }
        spline
    }

    #[test]
    fn construction_covers_interval() {
        let spline = PoseSpline::new(3, 0.1, 0.0, 1.0).unwrap();
        assert_eq!(spline.num_knots(), 13);
        assert!((spline.max_time() - 1.0).abs() < 1e-12);

        let spline = PoseSpline::new(2, 0.3, 0.0, 1.0).unwrap();
        assert_eq!(spline.num_knots(), 6);
        assert!(spline.max_time() >= 1.0);
    }

    #[test]
    fn construction_rejects_bad_input() {
        assert_eq!(PoseSpline::new(0, 0.1, 0.0, 1.0), Err(SplineError::InvalidOrder));
        assert!(matches!(
            PoseSpline::new(3, 0.0, 0.0, 1.0),
            Err(SplineError::NonPositiveDt(_))
        ));
        assert!(matches!(
            PoseSpline::new(3, 0.1, 1.0, 1.0),
            Err(SplineError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn evaluation_outside_range_fails() {
        let spline = wiggly_spline();
        assert!(matches!(
            spline.pose(spline.max_time()),
            Err(SplineError::OutOfRange { .. })
        ));
        assert!(spline.angular_velocity(-0.01).is_err());
        assert!(spline.knot(spline.num_knots()).is_err());
    }

    #[test]
    fn constant_knots_give_constant_pose() {
        let mut spline = PoseSpline::new(3, 0.2, 0.0, 1.0).unwrap();
        let knot = make_iso((0.1, 0.2, 0.3), (1.0, 2.0, 3.0));
        for i in 0..spline.num_knots() {
            spline.set_knot(i, knot).unwrap();
        }
        for t in [0.0, 0.33, 0.99] {
            let pose = spline.pose(t).unwrap();
            assert!(pose.rotation.angle_to(&knot.rotation) < 1e-12);
            assert!((pose.translation - knot.translation.vector).norm() < 1e-12);
            assert!(spline.angular_velocity(t).unwrap().norm() < 1e-12);
            assert!(spline.linear_velocity(t).unwrap().norm() < 1e-12);
        }
    }

    #[test]
    fn linear_knots_reproduce_linear_motion() {
        let mut spline = PoseSpline::new(3, 0.5, 0.0, 4.0).unwrap();
        for i in 0..spline.num_knots() {
            // Cubic knot `i` is centred at `start + (i - 1) * dt`.
            let x = (i as Real - 1.0) * 0.5;
            spline.set_knot(i, Iso3::translation(x, 0.0, 0.0)).unwrap();
        }
        for t in [0.0, 0.7, 2.25, 3.9] {
            assert!((spline.position(t).unwrap().x - t).abs() < 1e-12);
            assert!((spline.linear_velocity(t).unwrap().x - 1.0).abs() < 1e-12);
            assert!(spline.linear_acceleration(t).unwrap().norm() < 1e-12);
        }
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let spline = wiggly_spline();
        let h = 1e-6;
        for t in [0.1, 0.8, 1.37, 2.6] {
            let r0 = spline.rotation(t).unwrap();
            let r1 = spline.rotation(t + h).unwrap();
            let omega_fd = (r0.inverse() * r1).scaled_axis() / h;
            let omega = spline.angular_velocity(t).unwrap();
            assert!(
                (omega - omega_fd).norm() < 1e-4,
                "t={t}: omega {omega} vs fd {omega_fd}"
            );

            let v_fd = (spline.position(t + h).unwrap() - spline.position(t - h).unwrap()) / (2.0 * h);
            let v = spline.linear_velocity(t).unwrap();
            assert!((v - v_fd).norm() < 1e-5, "t={t}: v {v} vs fd {v_fd}");

            let a_fd = (spline.linear_velocity(t + h).unwrap()
                - spline.linear_velocity(t - h).unwrap())
                / (2.0 * h);
            let a = spline.linear_acceleration(t).unwrap();
            assert!((a - a_fd).norm() < 1e-4, "t={t}: a {a} vs fd {a_fd}");
        }
    }

    #[test]
    fn left_multiply_transforms_every_pose() {
        let spline = wiggly_spline();
        let transform = make_iso((0.4, -0.1, 1.2), (3.0, -2.0, 0.5));
        let moved = transform * spline.clone();
        for t in [0.0, 0.9, 2.2] {
            let expected = spline.pose(t).unwrap().left_transformed(&transform);
            let got = moved.pose(t).unwrap();
            assert!(got.rotation.angle_to(&expected.rotation) < 1e-10);
            assert!((got.translation - expected.translation).norm() < 1e-10);
        }
    }

    #[test]
    fn right_multiply_by_rotation_composes() {
        let spline = wiggly_spline();
        let transform = make_iso((-0.3, 0.25, 0.6), (0.0, 0.0, 0.0));
        let moved = spline.clone() * transform;
        for t in [0.0, 1.1, 2.9] {
            let expected = spline.pose(t).unwrap().right_transformed(&transform);
            let got = moved.pose(t).unwrap();
            assert!(got.rotation.angle_to(&expected.rotation) < 1e-10);
            assert!((got.translation - expected.translation).norm() < 1e-10);
        }
    }

    #[test]
    fn double_inversion_restores_poses() {
        let spline = wiggly_spline();
        let back = !!spline.clone();
        for t in [0.2, 1.6, 2.95] {
            let a = spline.pose(t).unwrap();
            let b = back.pose(t).unwrap();
            assert!(a.rotation.angle_to(&b.rotation) < 1e-12);
            assert!((a.translation - b.translation).norm() < 1e-12);
        }
    }

    #[test]
    fn sampling_is_finite_and_restartable() {
        let spline = PoseSpline::new(3, 0.2, 0.0, 2.0).unwrap();
        let sampler = spline.sampling(0.1).unwrap();
        let first: Vec<Pose> = sampler.clone().collect();
        let second: Vec<Pose> = sampler.collect();
        assert_eq!(first.len(), 20);
        assert_eq!(first, second);
        assert!(first.iter().all(|p| p.timestamp < spline.max_time()));
        assert!(spline.sampling(0.0).is_err());
    }

    #[test]
    fn seeding_picks_nearest_pose() {
        let mut spline = PoseSpline::new(3, 1.0, 0.0, 3.0).unwrap();
        let poses: Vec<Pose> = (0..30)
            .map(|i| {
                let t = i as Real * 0.1;
                Pose::new(Quat::identity(), Vec3::new(t, 0.0, 0.0), t)
            })
            .collect();
        spline.seed_from_poses(&poses).unwrap();
        // Knot 0 is centred before the first sample, knot 2 at t = 1.
        assert!((spline.knot(0).unwrap().translation.x - 0.0).abs() < 1e-12);
        assert!((spline.knot(2).unwrap().translation.x - 1.0).abs() < 1e-12);
        assert!(spline.seed_from_poses(&[]).is_err());
    }

    #[test]
    fn seeding_from_closed_form_reproduces_linear_motion() {
        let mut spline = PoseSpline::new(3, 0.25, 1.0, 3.0).unwrap();
        assert!((spline.knot_centre(0) - 0.75).abs() < 1e-12);
        assert!((spline.knot_centre(1) - 1.0).abs() < 1e-12);

        let rate = 0.4;
        spline.seed_with(|t| {
            Iso3::from_parts(
                Vec3::new(2.0 * t, -t, 0.5).into(),
                Quat::from_axis_angle(&Vec3::z_axis(), rate * t),
            )
        });
        for t in [1.0, 1.6, 2.3, 2.95] {
            let pose = spline.pose(t).unwrap();
            assert!((pose.translation - Vec3::new(2.0 * t, -t, 0.5)).norm() < 1e-12);
            let expected = Quat::from_axis_angle(&Vec3::z_axis(), rate * t);
            assert!(pose.rotation.angle_to(&expected) < 1e-12, "t = {t}");
        }
    }
}
