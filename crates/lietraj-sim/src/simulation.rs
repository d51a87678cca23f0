use std::f64::consts::TAU;
use std::ops::{Mul, Not};

use anyhow::{ensure, Result};
use lietraj_core::{Iso3, Pose, PoseSpline, Real, Vec3};
use lietraj_optim::backend::BackendSolveOptions;
use lietraj_optim::ir::Se3Components;
use lietraj_optim::{SolveSummary, TrajectoryEstimator};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::motion::{DrunkardWalk, MotionProfile, TimeSpan};

/// Sampling and fitting configuration of a simulated trajectory.
///
/// Knots are spaced `2 / hz` apart, i.e. one knot per two samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimuConfig {
    pub span: TimeSpan,
    /// Sampling rate of the pose sequence.
    pub hz: Real,
    /// Spline degree.
    #[serde(default = "default_order")]
    pub order: usize,
    /// Weight of the rotation prior that holds every knot near its seed.
    #[serde(default = "default_knot_prior_weight")]
    pub knot_prior_weight: Real,
    #[serde(default)]
    pub solve: BackendSolveOptions,
}

fn default_order() -> usize {
    3
}

fn default_knot_prior_weight() -> Real {
    0.1
}

impl Default for SimuConfig {
    fn default() -> Self {
        Self {
            span: TimeSpan::new(0.0, TAU),
            hz: 10.0,
            order: default_order(),
            knot_prior_weight: default_knot_prior_weight(),
            solve: BackendSolveOptions::default(),
        }
    }
}

impl SimuConfig {
    pub fn new(start: Real, end: Real, hz: Real) -> Self {
        Self {
            span: TimeSpan::new(start, end),
            hz,
            ..Self::default()
        }
    }

    pub fn knot_spacing(&self) -> Real {
        2.0 / self.hz
    }
}

/// A sampled reference motion together with the spline fitted to it.
#[derive(Debug, Clone)]
pub struct SimuTrajectory {
    hz: Real,
    pose_seq: Vec<Pose>,
    spline: PoseSpline,
    fit_summary: SolveSummary,
}

impl SimuTrajectory {
    /// Samples `profile` over the spline range and fits the spline to the samples.
    ///
    /// Closed-form profiles seed each knot with the profile pose at the knot's
    /// centre time; the random walk seeds from the nearest sample. Every
    /// rotation knot is then held near its seed with weight
    /// `config.knot_prior_weight`. Constant-rate rotations are reproduced
    /// exactly by such seeds, so the prior does not bias those fits.
    pub fn from_profile(mut profile: MotionProfile, config: &SimuConfig) -> Result<Self> {
        ensure!(
            config.hz.is_finite() && config.hz > 0.0,
            "sampling rate must be positive, got {}",
            config.hz
        );
        ensure!(
            config.knot_prior_weight.is_finite() && config.knot_prior_weight >= 0.0,
            "knot prior weight must be finite and non-negative, got {}",
            config.knot_prior_weight
        );
        let mut spline = PoseSpline::new(
            config.order,
            config.knot_spacing(),
            config.span.start,
            config.span.end,
        )?;

        let pose_seq: Vec<Pose> = sample_times(&spline, config.hz)
            .map(|t| profile.pose_at(t, &config.span))
            .collect();
        if profile.is_stateful() {
            spline.seed_from_poses(&pose_seq)?;
        } else {
            spline.seed_with(|t| profile.pose_at(t, &config.span).to_iso3());
        }

        let mut estimator = TrajectoryEstimator::new(&spline);
        for pose in &pose_seq {
            estimator.add_se3_measurement(pose, Se3Components::Full, 1.0, 1.0)?;
        }
        if config.knot_prior_weight > 0.0 {
            for (index, knot) in spline.knots().iter().enumerate() {
                estimator.add_rotation_prior(index, &knot.rotation, config.knot_prior_weight)?;
            }
        }
        let fit_summary = estimator.solve(&mut spline, &config.solve)?;
        if fit_summary.converged {
            info!(
                "fitted {} knots to {} simulated poses",
                spline.num_knots(),
                pose_seq.len()
            );
        } else {
            warn!("simulated trajectory fit did not converge: {fit_summary}");
        }

        Ok(Self {
            hz: config.hz,
            pose_seq,
            spline,
            fit_summary,
        })
    }

    pub fn circular(radius: Real, config: &SimuConfig) -> Result<Self> {
        ensure_radius(radius)?;
        Self::from_profile(MotionProfile::Circular { radius }, config)
    }

    pub fn spiral(radius: Real, height_each_circle: Real, config: &SimuConfig) -> Result<Self> {
        ensure_radius(radius)?;
        Self::from_profile(
            MotionProfile::Spiral {
                radius,
                height_each_circle,
            },
            config,
        )
    }

    pub fn wave(radius: Real, height: Real, config: &SimuConfig) -> Result<Self> {
        ensure_radius(radius)?;
        Self::from_profile(MotionProfile::Wave { radius, height }, config)
    }

    pub fn uniform_linear(from: Vec3, to: Vec3, config: &SimuConfig) -> Result<Self> {
        ensure!((to - from).norm() > 0.0, "start and end positions coincide");
        Self::from_profile(MotionProfile::UniformLinear { from, to }, config)
    }

    pub fn uniform_accelerated(from: Vec3, to: Vec3, config: &SimuConfig) -> Result<Self> {
        ensure!((to - from).norm() > 0.0, "start and end positions coincide");
        Self::from_profile(MotionProfile::UniformAccelerated { from, to }, config)
    }

    /// Random walk seeded with `seed`; `max_angle_deg` is in degrees.
    pub fn drunkard(
        origin: Vec3,
        max_stride: Real,
        max_angle_deg: Real,
        seed: u64,
        config: &SimuConfig,
    ) -> Result<Self> {
        ensure!(
            max_stride >= 0.0 && max_angle_deg >= 0.0,
            "random walk bounds must be non-negative"
        );
        let walk = DrunkardWalk::new(origin, max_stride, max_angle_deg, seed);
        Self::from_profile(MotionProfile::Drunkard(walk), config)
    }

    pub fn hz(&self) -> Real {
        self.hz
    }

    pub fn pose_sequence(&self) -> &[Pose] {
        &self.pose_seq
    }

    pub fn spline(&self) -> &PoseSpline {
        &self.spline
    }

    pub fn fit_summary(&self) -> &SolveSummary {
        &self.fit_summary
    }

    /// Applies `pose * transform` to every sample and knot.
    pub fn right_multiplied(&self, transform: &Iso3) -> Self {
        let mut out = self.clone();
        out.right_multiply(transform);
        out
    }

    /// Applies `transform * pose` to every sample and knot.
    pub fn left_multiplied(&self, transform: &Iso3) -> Self {
        let mut out = self.clone();
        out.left_multiply(transform);
        out
    }

    /// Inverts every sample and knot.
    pub fn inverted(&self) -> Self {
        let mut out = self.clone();
        out.invert();
        out
    }

    fn right_multiply(&mut self, transform: &Iso3) {
        for pose in &mut self.pose_seq {
            *pose = pose.right_transformed(transform);
        }
        self.spline.right_multiply(transform);
    }

    fn left_multiply(&mut self, transform: &Iso3) {
        for pose in &mut self.pose_seq {
            *pose = pose.left_transformed(transform);
        }
        self.spline.left_multiply(transform);
    }

    fn invert(&mut self) {
        for pose in &mut self.pose_seq {
            *pose = pose.inverse();
        }
        self.spline.invert();
    }
}

impl Mul<Iso3> for SimuTrajectory {
    type Output = SimuTrajectory;

    fn mul(mut self, rhs: Iso3) -> SimuTrajectory {
        self.right_multiply(&rhs);
        self
    }
}

impl Mul<SimuTrajectory> for Iso3 {
    type Output = SimuTrajectory;

    fn mul(self, mut rhs: SimuTrajectory) -> SimuTrajectory {
        rhs.left_multiply(&self);
        rhs
    }
}

impl Not for SimuTrajectory {
    type Output = SimuTrajectory;

    fn not(mut self) -> SimuTrajectory {
        self.invert();
        self
    }
}

fn ensure_radius(radius: Real) -> Result<()> {
    ensure!(
        radius.is_finite() && radius > 0.0,
        "radius must be positive, got {radius}"
    );
    Ok(())
}

/// `min_time + i / hz` for every sample time inside the spline range.
fn sample_times(spline: &PoseSpline, hz: Real) -> impl Iterator<Item = Real> {
    let start = spline.min_time();
    let end = spline.max_time();
    (0..)
        .map(move |i: usize| start + i as Real / hz)
        .take_while(move |t| *t < end)
}
