use crate::backend::{
    BackendSolution, BackendSolveOptions, LinearSolverKind, OptimBackend, So3Manifold, Termination,
};
use crate::factors::imu_gyro::gyro_residual_generic;
use crate::factors::knot_prior::rotation_prior_residual_generic;
use crate::factors::se3_pose::se3_pose_residual_generic;
use crate::ir::{FactorKind, ManifoldKind, ProblemIR, ResidualBlock, RobustLoss, Se3Components};
use anyhow::{anyhow, ensure, Result};
use lietraj_core::SplineBasis;
use log::{debug, warn};
use nalgebra::DVector;
use std::collections::HashMap;
use std::sync::Arc;
use tiny_solver::factors::Factor;
use tiny_solver::loss_functions::{CauchyLoss, HuberLoss, Loss};
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

/// tiny-solver backend adapter.
///
/// Solves in passes of `iters_per_pass` Levenberg-Marquardt iterations and
/// evaluates the cost between passes, which gives the caller an iteration
/// count and a convergence verdict that tiny-solver does not report itself.
#[derive(Debug, Clone, Copy)]
pub struct TinySolverBackend;

impl TinySolverBackend {
    fn compile(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
    ) -> Result<(Problem, HashMap<String, DVector<f64>>)> {
        ir.validate()?;
        ensure!(!ir.residuals.is_empty(), "problem has no residual blocks");

        let referenced = ir.referenced_params();
        let mut problem = Problem::new();
        let mut values = HashMap::with_capacity(referenced.len());

        for param in &ir.params {
            if !referenced.contains(&param.id) {
                debug!("skipping unreferenced parameter block {}", param.name);
                continue;
            }
            let init = initial.get(&param.name).ok_or_else(|| {
                anyhow!(
                    "initial values missing parameter {} (id {:?})",
                    param.name,
                    param.id
                )
            })?;
            ensure!(
                init.len() == param.dim,
                "initial dimension mismatch for {}: expected {}, got {}",
                param.name,
                param.dim,
                init.len()
            );

            match param.manifold {
                ManifoldKind::Euclidean => {}
                ManifoldKind::SO3 => {
                    if param.fixed.is_empty() {
                        problem.set_variable_manifold(&param.name, Arc::new(So3Manifold));
                    } else if !param.fixed.is_all_fixed(param.dim) {
                        return Err(anyhow!(
                            "tiny-solver cannot partially fix SO3 manifold {}",
                            param.name
                        ));
                    }
                }
            }

            for idx in param.fixed.iter() {
                problem.fix_variable(&param.name, idx);
            }
            values.insert(param.name.clone(), init.clone());
        }

        for residual in &ir.residuals {
            let (factor, loss) = compile_factor(residual)?;
            let param_names: Vec<String> = residual
                .params
                .iter()
                .map(|id| ir.params[id.0].name.clone())
                .collect();
            let param_refs: Vec<&str> = param_names.iter().map(|s| s.as_str()).collect();
            problem.add_residual_block(residual.residual_dim, &param_refs, factor, loss);
        }

        Ok((problem, values))
    }
}

impl OptimBackend for TinySolverBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        ensure!(opts.max_iters > 0, "max_iters must be positive");
        let (problem, mut current) = self.compile(ir, initial)?;
        let optimizer = LevenbergMarquardtOptimizer::default();
        let min_error = opts.min_error.unwrap_or(0.0);

        let initial_cost = evaluate_cost(&problem, &current);
        ensure!(
            initial_cost.is_finite(),
            "initial cost is not finite ({initial_cost})"
        );
        let mut cost = initial_cost;
        let mut iterations = 0;
        let mut passes = 0;
        let mut termination = Termination::MaxIterations;

        while iterations < opts.max_iters {
            if cost <= min_error {
                termination = Termination::Converged;
                break;
            }
            let pass_iters = opts
                .iters_per_pass
                .max(1)
                .min(opts.max_iters - iterations);
            let options = to_optimizer_options(opts, pass_iters);
            let Some(next) = optimizer.optimize(&problem, &current, Some(options)) else {
                warn!(
                    "tiny-solver pass {} produced no solution; keeping cost {:.6e}",
                    passes + 1,
                    cost
                );
                termination = Termination::SolverFailed;
                break;
            };
            iterations += pass_iters;
            passes += 1;

            let next_cost = evaluate_cost(&problem, &next);
            debug!("pass {passes}: cost {cost:.6e} -> {next_cost:.6e}");
            if !next_cost.is_finite() {
                warn!("tiny-solver pass {passes} produced a non-finite cost");
                termination = Termination::SolverFailed;
                break;
            }
            if next_cost >= cost {
                termination = Termination::Converged;
                break;
            }

            let decrease = cost - next_cost;
            let previous = cost;
            current = next;
            cost = next_cost;
            if cost <= min_error
                || decrease <= opts.min_abs_decrease.unwrap_or(0.0)
                || decrease <= opts.min_rel_decrease.unwrap_or(0.0) * previous
            {
                termination = Termination::Converged;
                break;
            }
        }

        Ok(BackendSolution {
            params: current,
            initial_cost,
            final_cost: cost,
            iterations,
            passes,
            termination,
        })
    }
}

fn evaluate_cost(problem: &Problem, values: &HashMap<String, DVector<f64>>) -> f64 {
    let param_blocks = problem.initialize_parameter_blocks(values);
    let residuals = problem.compute_residuals(&param_blocks, true);
    0.5 * residuals.as_ref().squared_norm_l2()
}

fn to_optimizer_options(opts: &BackendSolveOptions, max_iteration: usize) -> OptimizerOptions {
    let mut options = OptimizerOptions {
        max_iteration,
        verbosity_level: opts.verbosity,
        ..OptimizerOptions::default()
    };
    if let Some(solver) = opts.linear_solver {
        options.linear_solver_type = match solver {
            LinearSolverKind::SparseCholesky => LinearSolverType::SparseCholesky,
            LinearSolverKind::SparseQR => LinearSolverType::SparseQR,
        };
    }
    if let Some(v) = opts.min_abs_decrease {
        options.min_abs_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_rel_decrease {
        options.min_rel_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_error {
        options.min_error_threshold = v;
    }
    options
}

fn compile_loss(loss: RobustLoss) -> Result<Option<Box<dyn Loss + Send>>> {
    match loss {
        RobustLoss::None => Ok(None),
        RobustLoss::Huber { scale } => {
            ensure!(scale > 0.0, "Huber scale must be positive");
            Ok(Some(Box::new(HuberLoss::new(scale))))
        }
        RobustLoss::Cauchy { scale } => {
            ensure!(scale > 0.0, "Cauchy scale must be positive");
            Ok(Some(Box::new(CauchyLoss::new(scale))))
        }
    }
}

type CompiledFactor = (
    Box<dyn tiny_solver::factors::FactorImpl + Send>,
    Option<Box<dyn Loss + Send>>,
);

fn compile_factor(residual: &ResidualBlock) -> Result<CompiledFactor> {
    let loss = compile_loss(residual.loss)?;
    match &residual.factor {
        FactorKind::Se3Pose {
            order,
            u,
            rotation_xyzw,
            translation,
            components,
            rot_weight,
            pos_weight,
        } => {
            let factor = TinySe3PoseFactor {
                basis: SplineBasis::new(*order),
                u: *u,
                rotation_xyzw: *rotation_xyzw,
                translation: *translation,
                components: *components,
                rot_weight: *rot_weight,
                pos_weight: *pos_weight,
            };
            Ok((Box::new(factor), loss))
        }
        FactorKind::ImuGyro {
            order,
            u,
            inv_dt,
            gyro,
            w,
        } => {
            let factor = TinyImuGyroFactor {
                basis: SplineBasis::new(*order),
                u: *u,
                inv_dt: *inv_dt,
                gyro: *gyro,
                w: *w,
            };
            Ok((Box::new(factor), loss))
        }
        FactorKind::KnotRotationPrior {
            rotation_xyzw,
            weight,
        } => {
            let factor = TinyKnotRotationPriorFactor {
                rotation_xyzw: *rotation_xyzw,
                weight: *weight,
            };
            Ok((Box::new(factor), loss))
        }
    }
}

#[derive(Debug, Clone)]
struct TinySe3PoseFactor {
    basis: SplineBasis,
    u: f64,
    rotation_xyzw: [f64; 4],
    translation: [f64; 3],
    components: Se3Components,
    rot_weight: f64,
    pos_weight: f64,
}

impl<T: nalgebra::RealField> Factor<T> for TinySe3PoseFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let window = self.basis.order() + 1;
        let (so3, pos) = if self.components.has_rotation() {
            params.split_at(window)
        } else {
            params.split_at(0)
        };
        debug_assert!(
            self.components.has_position() == !pos.is_empty(),
            "expected [so3 knots.., pos knots..] parameter blocks"
        );
        se3_pose_residual_generic(
            so3,
            pos,
            &self.basis,
            self.u,
            self.rotation_xyzw,
            self.translation,
            self.rot_weight,
            self.pos_weight,
        )
    }
}

#[derive(Debug, Clone)]
struct TinyImuGyroFactor {
    basis: SplineBasis,
    u: f64,
    inv_dt: f64,
    gyro: [f64; 3],
    w: f64,
}

impl<T: nalgebra::RealField> Factor<T> for TinyImuGyroFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let window = self.basis.order() + 1;
        debug_assert_eq!(
            params.len(),
            window + 3,
            "expected [so3 knots.., bias, map, sensor_to_body] parameter blocks"
        );
        let (knots, aux) = params.split_at(window);
        let r = gyro_residual_generic(
            knots,
            aux[0].as_view(), // bias
            aux[1].as_view(), // map coefficients
            aux[2].as_view(), // sensor-to-body rotation
            &self.basis,
            self.u,
            self.inv_dt,
            self.gyro,
            self.w,
        );
        DVector::from_row_slice(r.as_slice())
    }
}

#[derive(Debug, Clone)]
struct TinyKnotRotationPriorFactor {
    rotation_xyzw: [f64; 4],
    weight: f64,
}

impl<T: nalgebra::RealField> Factor<T> for TinyKnotRotationPriorFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 1, "expected a single so3 knot block");
        let r = rotation_prior_residual_generic(
            params[0].as_view(),
            self.rotation_xyzw,
            self.weight,
        );
        DVector::from_row_slice(r.as_slice())
    }
}
