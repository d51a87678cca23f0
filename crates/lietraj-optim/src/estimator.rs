//! Fitting spline knots to pose and gyroscope measurements.
//!
//! Measurements are turned into residual blocks as they are added. Each one
//! reads the `order + 1` knots of its time window; knot parameter blocks are
//! created the first time a measurement touches them, so knots outside every
//! window never enter the problem. Gyro measurements additionally share three
//! auxiliary blocks owned by the estimator: bias, map coefficients and the
//! sensor-to-body rotation.

use crate::backend::{solve_with_backend, BackendKind, BackendSolveOptions, Termination};
use crate::ir::{
    FactorKind, FixedMask, ManifoldKind, ParamId, ProblemIR, ResidualBlock, RobustLoss,
    Se3Components,
};
use crate::params::gyro::{GyroIntrinsics, GYRO_MAP_DIM};
use crate::params::so3::{dvec_to_quat, dvec_to_vec3, quat_to_dvec, vec3_to_dvec};
use anyhow::{ensure, Context, Result};
use lietraj_core::{ImuFrame, Iso3, Pose, PoseSpline, Quat, Real, SplineSegment};
use log::{debug, info};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Parameter block name of the gyroscope bias.
pub const GYRO_BIAS: &str = "gyro_bias";
/// Parameter block name of the gyroscope map coefficients.
pub const GYRO_MAP: &str = "gyro_map";
/// Parameter block name of the sensor-to-body rotation.
pub const SENSOR_TO_BODY: &str = "so3_sensor_to_body";

fn so3_knot_name(index: usize) -> String {
    format!("so3/{index}")
}

fn pos_knot_name(index: usize) -> String {
    format!("pos/{index}")
}

/// Options controlling which blocks are optimized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimatorOptions {
    pub robust_loss: RobustLoss,
    pub fix_so3_knots: bool,
    pub fix_pos_knots: bool,
    pub fix_gyro_bias: bool,
    pub fix_gyro_map: bool,
    pub fix_sensor_to_body: bool,
}

/// Outcome of [`TrajectoryEstimator::solve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveSummary {
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Iteration budget consumed by the executed passes
    /// (`passes * iters_per_pass`, capped by `max_iters`). An upper bound on the
    /// Levenberg-Marquardt iterations actually run.
    pub iterations: usize,
    pub passes: usize,
    pub converged: bool,
    pub termination: Termination,
    pub num_residuals: usize,
    pub num_params: usize,
}

impl fmt::Display for SolveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} residuals, {} parameter blocks, cost {:.6e} -> {:.6e} in {} passes ({} iterations budgeted), {}",
            self.num_residuals,
            self.num_params,
            self.initial_cost,
            self.final_cost,
            self.passes,
            self.iterations,
            self.termination
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct GyroBlocks {
    bias: ParamId,
    map: ParamId,
    sensor_to_body: ParamId,
}

/// Accumulates measurements against a spline and fits its knots.
///
/// The estimator keeps a copy of the spline's knot timing. The spline itself is
/// only borrowed by [`solve`](Self::solve), which reads the current knots as the
/// initial guess and writes the optimized knots back.
#[derive(Debug, Clone)]
pub struct TrajectoryEstimator {
    segment: SplineSegment,
    options: EstimatorOptions,
    ir: ProblemIR,
    so3_knots: Vec<Option<ParamId>>,
    pos_knots: Vec<Option<ParamId>>,
    gyro_blocks: Option<GyroBlocks>,
    gyro: GyroIntrinsics,
    sensor_to_body: Quat,
}

impl TrajectoryEstimator {
    pub fn new(spline: &PoseSpline) -> Self {
        Self::with_options(spline, EstimatorOptions::default())
    }

    pub fn with_options(spline: &PoseSpline, options: EstimatorOptions) -> Self {
        let num_knots = spline.num_knots();
        Self {
            segment: spline.segment(),
            options,
            ir: ProblemIR::new(),
            so3_knots: vec![None; num_knots],
            pos_knots: vec![None; num_knots],
            gyro_blocks: None,
            gyro: GyroIntrinsics::default(),
            sensor_to_body: Quat::identity(),
        }
    }

    pub fn options(&self) -> &EstimatorOptions {
        &self.options
    }

    pub fn segment(&self) -> SplineSegment {
        self.segment
    }

    pub fn num_residuals(&self) -> usize {
        self.ir.residuals.len()
    }

    pub fn problem(&self) -> &ProblemIR {
        &self.ir
    }

    /// Current gyro intrinsics; updated by every solve that includes gyro data.
    pub fn gyro_intrinsics(&self) -> &GyroIntrinsics {
        &self.gyro
    }

    /// Initial guess for the gyro intrinsics.
    pub fn set_gyro_intrinsics(&mut self, gyro: GyroIntrinsics) {
        self.gyro = gyro;
    }

    pub fn sensor_to_body(&self) -> Quat {
        self.sensor_to_body
    }

    /// Initial guess for the sensor-to-body rotation.
    pub fn set_sensor_to_body(&mut self, rotation: Quat) {
        self.sensor_to_body = rotation;
    }

    /// Adds a pose measurement.
    ///
    /// `components` selects the rotation and/or position residual; the unused
    /// weight is ignored. Fails if the timestamp is outside the spline range.
    pub fn add_se3_measurement(
        &mut self,
        pose: &Pose,
        components: Se3Components,
        pos_weight: Real,
        rot_weight: Real,
    ) -> Result<()> {
        ensure!(
            pos_weight.is_finite() && rot_weight.is_finite(),
            "pose measurement weights must be finite"
        );
        let (window, u) = self
            .segment
            .window(pose.timestamp)
            .with_context(|| format!("pose measurement at t={}", pose.timestamp))?;

        let mut params = Vec::with_capacity(2 * window.len());
        if components.has_rotation() {
            for index in window.clone() {
                params.push(self.so3_knot(index));
            }
        }
        if components.has_position() {
            for index in window {
                params.push(self.pos_knot(index));
            }
        }

        let c = pose.rotation.quaternion().coords;
        let t = pose.translation;
        self.ir.add_residual_block(ResidualBlock {
            params,
            loss: self.options.robust_loss,
            factor: FactorKind::Se3Pose {
                order: self.segment.order,
                u,
                rotation_xyzw: [c[0], c[1], c[2], c[3]],
                translation: [t.x, t.y, t.z],
                components,
                rot_weight,
                pos_weight,
            },
            residual_dim: components.residual_dim(),
        });
        Ok(())
    }

    /// Adds a gyroscope measurement.
    ///
    /// Residual: `weight * (M * (R_s2b * ω(t)) + b - frame.gyro)`.
    pub fn add_gyro_measurement(&mut self, frame: &ImuFrame, weight: Real) -> Result<()> {
        ensure!(weight.is_finite(), "gyro weight must be finite");
        let (window, u) = self
            .segment
            .window(frame.timestamp)
            .with_context(|| format!("gyro measurement at t={}", frame.timestamp))?;

        let mut params: Vec<ParamId> = window.map(|index| self.so3_knot(index)).collect();
        let aux = self.ensure_gyro_blocks();
        params.extend([aux.bias, aux.map, aux.sensor_to_body]);

        self.ir.add_residual_block(ResidualBlock {
            params,
            loss: self.options.robust_loss,
            factor: FactorKind::ImuGyro {
                order: self.segment.order,
                u,
                inv_dt: self.segment.inv_dt(),
                gyro: [frame.gyro.x, frame.gyro.y, frame.gyro.z],
                w: weight,
            },
            residual_dim: 3,
        });
        Ok(())
    }

    /// Holds rotation knot `index` near `rotation`.
    ///
    /// Residual: `weight * log(rotation^-1 R_index)`, never robustified. Knots at
    /// the end of the spline are only seen by a few measurements with small
    /// cumulative weights; a weak prior keeps them from drifting towards the
    /// `log` branch cut.
    pub fn add_rotation_prior(&mut self, index: usize, rotation: &Quat, weight: Real) -> Result<()> {
        ensure!(
            index < self.segment.num_knots,
            "knot index {index} out of range for {} knots",
            self.segment.num_knots
        );
        ensure!(
            weight.is_finite() && weight >= 0.0,
            "prior weight must be finite and non-negative, got {weight}"
        );
        let knot = self.so3_knot(index);
        let c = rotation.quaternion().coords;
        self.ir.add_residual_block(ResidualBlock {
            params: vec![knot],
            loss: RobustLoss::None,
            factor: FactorKind::KnotRotationPrior {
                rotation_xyzw: [c[0], c[1], c[2], c[3]],
                weight,
            },
            residual_dim: 3,
        });
        Ok(())
    }

    /// Optimizes the knots of `spline` against all measurements added so far.
    ///
    /// Non-convergence is reported through [`SolveSummary`]; the spline then
    /// holds the best knots the solver reached. Errors are reserved for misuse:
    /// a spline with different timing, or no measurements.
    pub fn solve(
        &mut self,
        spline: &mut PoseSpline,
        opts: &BackendSolveOptions,
    ) -> Result<SolveSummary> {
        ensure!(
            spline.segment() == self.segment,
            "spline timing {:?} does not match estimator timing {:?}",
            spline.segment(),
            self.segment
        );
        ensure!(
            !self.ir.residuals.is_empty(),
            "no measurements added to the estimator"
        );

        let initial = self.initial_values(spline);
        let solution = solve_with_backend(BackendKind::TinySolver, &self.ir, &initial, opts)?;

        for (index, knot) in spline.knots().to_vec().into_iter().enumerate() {
            let mut rotation = knot.rotation;
            let mut translation = knot.translation.vector;
            if self.so3_knots[index].is_some() {
                if let Some(v) = solution.params.get(&so3_knot_name(index)) {
                    rotation = dvec_to_quat(v.as_view())?;
                }
            }
            if self.pos_knots[index].is_some() {
                if let Some(v) = solution.params.get(&pos_knot_name(index)) {
                    translation = dvec_to_vec3(v.as_view())?;
                }
            }
            spline.set_knot(index, Iso3::from_parts(translation.into(), rotation))?;
        }

        if self.gyro_blocks.is_some() {
            if let (Some(bias), Some(map)) =
                (solution.params.get(GYRO_BIAS), solution.params.get(GYRO_MAP))
            {
                self.gyro = GyroIntrinsics::from_dvecs(bias.as_view(), map.as_view())?;
            }
            if let Some(rotation) = solution.params.get(SENSOR_TO_BODY) {
                self.sensor_to_body = dvec_to_quat(rotation.as_view())?;
            }
        }

        let summary = SolveSummary {
            initial_cost: solution.initial_cost,
            final_cost: solution.final_cost,
            iterations: solution.iterations,
            passes: solution.passes,
            converged: solution.termination == Termination::Converged,
            termination: solution.termination,
            num_residuals: self.ir.residuals.len(),
            num_params: initial.len(),
        };
        info!("trajectory estimation: {summary}");
        Ok(summary)
    }

    fn initial_values(&self, spline: &PoseSpline) -> HashMap<String, DVector<f64>> {
        let mut initial = HashMap::new();
        for (index, knot) in spline.knots().iter().enumerate() {
            if self.so3_knots[index].is_some() {
                initial.insert(so3_knot_name(index), quat_to_dvec(&knot.rotation));
            }
            if self.pos_knots[index].is_some() {
                initial.insert(pos_knot_name(index), vec3_to_dvec(&knot.translation.vector));
            }
        }
        if self.gyro_blocks.is_some() {
            initial.insert(GYRO_BIAS.to_string(), self.gyro.bias_to_dvec());
            initial.insert(GYRO_MAP.to_string(), self.gyro.map_to_dvec());
            initial.insert(SENSOR_TO_BODY.to_string(), quat_to_dvec(&self.sensor_to_body));
        }
        initial
    }

    fn so3_knot(&mut self, index: usize) -> ParamId {
        if let Some(id) = self.so3_knots[index] {
            return id;
        }
        let id = self.ir.add_param_block(
            so3_knot_name(index),
            4,
            ManifoldKind::SO3,
            FixedMask::from_flag(self.options.fix_so3_knots, 4),
        );
        self.so3_knots[index] = Some(id);
        id
    }

    fn pos_knot(&mut self, index: usize) -> ParamId {
        if let Some(id) = self.pos_knots[index] {
            return id;
        }
        let id = self.ir.add_param_block(
            pos_knot_name(index),
            3,
            ManifoldKind::Euclidean,
            FixedMask::from_flag(self.options.fix_pos_knots, 3),
        );
        self.pos_knots[index] = Some(id);
        id
    }

    fn ensure_gyro_blocks(&mut self) -> GyroBlocks {
        if let Some(blocks) = self.gyro_blocks {
            return blocks;
        }
        debug!("creating gyro parameter blocks");
        let blocks = GyroBlocks {
            bias: self.ir.add_param_block(
                GYRO_BIAS,
                3,
                ManifoldKind::Euclidean,
                FixedMask::from_flag(self.options.fix_gyro_bias, 3),
            ),
            map: self.ir.add_param_block(
                GYRO_MAP,
                GYRO_MAP_DIM,
                ManifoldKind::Euclidean,
                FixedMask::from_flag(self.options.fix_gyro_map, GYRO_MAP_DIM),
            ),
            sensor_to_body: self.ir.add_param_block(
                SENSOR_TO_BODY,
                4,
                ManifoldKind::SO3,
                FixedMask::from_flag(self.options.fix_sensor_to_body, 4),
            ),
        };
        self.gyro_blocks = Some(blocks);
        blocks
    }
}
