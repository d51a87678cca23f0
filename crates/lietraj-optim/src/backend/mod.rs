//! Backend adapters that compile the IR into solver-specific problems.
//!
//! Backends are responsible for translating the IR into solver-native graphs,
//! applying manifolds and fixed parameters, and returning a solved parameter map.

mod tiny_solver_backend;
mod tiny_solver_manifolds;

use anyhow::Result;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::ir::ProblemIR;

pub use tiny_solver_backend::TinySolverBackend;
pub use tiny_solver_manifolds::So3Manifold;

/// Backend-agnostic solver options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSolveOptions {
    /// Maximum number of iterations for the optimizer.
    pub max_iters: usize,
    /// Iterations per solver pass; the cost is checked between passes.
    pub iters_per_pass: usize,
    /// Verbosity level (backend-specific).
    pub verbosity: usize,
    /// Optional linear solver selection.
    pub linear_solver: Option<LinearSolverKind>,
    /// Absolute error decrease threshold for early termination.
    pub min_abs_decrease: Option<f64>,
    /// Relative error decrease threshold for early termination.
    pub min_rel_decrease: Option<f64>,
    /// Error threshold for early termination.
    pub min_error: Option<f64>,
}

impl Default for BackendSolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            iters_per_pass: 10,
            verbosity: 0,
            linear_solver: Some(LinearSolverKind::SparseCholesky),
            min_abs_decrease: Some(1e-5),
            min_rel_decrease: Some(1e-5),
            min_error: Some(1e-10),
        }
    }
}

/// Linear solver selection (backend-agnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearSolverKind {
    /// Sparse Cholesky decomposition.
    SparseCholesky,
    /// Sparse QR decomposition.
    SparseQR,
}

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Cost reached `min_error` or stopped decreasing.
    Converged,
    /// The iteration budget ran out while the cost was still decreasing.
    MaxIterations,
    /// The solver produced no usable step; the best parameters so far are kept.
    SolverFailed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Termination::Converged => "converged",
            Termination::MaxIterations => "iteration budget exhausted",
            Termination::SolverFailed => "solver failed",
        };
        f.write_str(text)
    }
}

/// Solver output from a backend.
///
/// The `params` map uses the IR parameter block names and contains every block
/// referenced by a residual.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    /// Optimized parameter vectors keyed by block name.
    pub params: HashMap<String, DVector<f64>>,
    /// Robustified cost at the initial parameters.
    pub initial_cost: f64,
    /// Robustified cost at the returned parameters.
    pub final_cost: f64,
    /// Sum of the per-pass iteration budgets of the executed passes.
    ///
    /// tiny-solver does not report how many iterations a pass actually ran, so
    /// this is an upper bound: a pass that stops early still counts its whole
    /// budget.
    pub iterations: usize,
    /// Number of solver passes that produced a solution.
    pub passes: usize,
    pub termination: Termination,
}

/// Backend interface implemented by solver adapters.
pub trait OptimBackend {
    /// Solve a compiled IR with the provided initial parameters.
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution>;
}

/// Supported solver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// tiny-solver Levenberg-Marquardt backend.
    #[default]
    TinySolver,
}

/// Solve a problem using the selected backend.
pub fn solve_with_backend(
    backend: BackendKind,
    ir: &ProblemIR,
    initial: &HashMap<String, DVector<f64>>,
    opts: &BackendSolveOptions,
) -> Result<BackendSolution> {
    match backend {
        BackendKind::TinySolver => TinySolverBackend.solve(ir, initial, opts),
    }
}
