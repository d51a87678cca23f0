use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier for a parameter block in the IR.
///
/// This is stable within a `ProblemIR` instance and is used by residual blocks
/// to reference their parameter dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub usize);

/// Supported manifold types for parameter blocks.
///
/// Each variant implies an expected ambient parameter dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifoldKind {
    /// Standard Euclidean vector space.
    Euclidean,
    /// SO(3) rotation stored as quaternion `[qx, qy, qz, qw]`.
    SO3,
}

impl ManifoldKind {
    /// Returns `true` if the given ambient dimension matches the manifold storage.
    pub fn compatible_dim(self, dim: usize) -> bool {
        match self {
            ManifoldKind::Euclidean => dim > 0,
            ManifoldKind::SO3 => dim == 4,
        }
    }
}

/// Fixed parameter mask for a block.
///
/// Backends interpret this as per-index fixing for Euclidean blocks; manifold
/// blocks can only be fixed as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedMask {
    fixed_indices: HashSet<usize>,
}

impl FixedMask {
    pub fn all_free() -> Self {
        Self {
            fixed_indices: HashSet::new(),
        }
    }

    pub fn all_fixed(dim: usize) -> Self {
        Self {
            fixed_indices: (0..dim).collect(),
        }
    }

    /// Fixes the whole block when `fixed` is set, otherwise leaves it free.
    pub fn from_flag(fixed: bool, dim: usize) -> Self {
        if fixed {
            Self::all_fixed(dim)
        } else {
            Self::all_free()
        }
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed_indices.contains(&idx)
    }

    /// Returns `true` if all indices `[0, dim)` are fixed.
    pub fn is_all_fixed(&self, dim: usize) -> bool {
        (0..dim).all(|idx| self.is_fixed(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed_indices.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_indices.is_empty()
    }
}

/// Robust loss applied to a residual block.
///
/// Each measurement is its own residual block, so the loss acts per measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum RobustLoss {
    #[default]
    None,
    Huber {
        scale: f64,
    },
    Cauchy {
        scale: f64,
    },
}

/// Which parts of a pose measurement contribute residuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Se3Components {
    Position,
    Rotation,
    #[default]
    Full,
}

impl Se3Components {
    pub fn has_rotation(self) -> bool {
        matches!(self, Se3Components::Rotation | Se3Components::Full)
    }

    pub fn has_position(self) -> bool {
        matches!(self, Se3Components::Position | Se3Components::Full)
    }

    pub fn residual_dim(self) -> usize {
        3 * (usize::from(self.has_rotation()) + usize::from(self.has_position()))
    }
}

/// Backend-agnostic factor kinds.
///
/// Each factor kind implies its parameter layout and residual dimension. The
/// measurement factors read one spline window of `order + 1` consecutive
/// knots; `u` is the normalized time inside the window's segment.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorKind {
    /// Spline pose against a measured pose.
    ///
    /// Parameters: `[so3 knots..][pos knots..]`, each group present only when
    /// `components` selects it.
    /// Residual: `[rot_weight * log(R_meas^-1 R(t)); pos_weight * (p(t) - p_meas)]`.
    Se3Pose {
        order: usize,
        u: f64,
        rotation_xyzw: [f64; 4],
        translation: [f64; 3],
        components: Se3Components,
        rot_weight: f64,
        pos_weight: f64,
    },
    /// Spline angular velocity against a gyroscope reading.
    ///
    /// Parameters: `[so3 knots.., gyro_bias, gyro_map, so3_sensor_to_body]`.
    /// Residual: `w * (M * (R_s2b * ω(t)) + b - gyro)`.
    ImuGyro {
        order: usize,
        u: f64,
        inv_dt: f64,
        gyro: [f64; 3],
        w: f64,
    },
    /// Single rotation knot held near a reference rotation.
    ///
    /// Parameters: `[so3 knot]`.
    /// Residual: `weight * log(R_ref^-1 R_knot)`.
    KnotRotationPrior { rotation_xyzw: [f64; 4], weight: f64 },
}

impl FactorKind {
    /// Residual dimension implied by the factor.
    pub fn residual_dim(&self) -> usize {
        match self {
            FactorKind::Se3Pose { components, .. } => components.residual_dim(),
            FactorKind::ImuGyro { .. } | FactorKind::KnotRotationPrior { .. } => 3,
        }
    }
}

/// Parameter block definition in the IR.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub dim: usize,
    pub manifold: ManifoldKind,
    pub fixed: FixedMask,
}

/// Residual block definition in the IR.
///
/// The order of `params` must match the factor's expected parameter order.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub params: Vec<ParamId>,
    pub loss: RobustLoss,
    pub factor: FactorKind,
    pub residual_dim: usize,
}

/// Backend-agnostic optimization problem representation.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter block and returns its `ParamId`.
    pub fn add_param_block(
        &mut self,
        name: impl Into<String>,
        dim: usize,
        manifold: ManifoldKind,
        fixed: FixedMask,
    ) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(ParamBlock {
            id,
            name: name.into(),
            dim,
            manifold,
            fixed,
        });
        id
    }

    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    pub fn param_by_name(&self, name: &str) -> Option<ParamId> {
        self.params.iter().find(|p| p.name == name).map(|p| p.id)
    }

    /// Ids of all parameter blocks referenced by at least one residual.
    pub fn referenced_params(&self) -> HashSet<ParamId> {
        self.residuals
            .iter()
            .flat_map(|r| r.params.iter().copied())
            .collect()
    }

    /// Validates internal consistency and factor expectations.
    pub fn validate(&self) -> Result<()> {
        for (idx, param) in self.params.iter().enumerate() {
            ensure!(
                param.id.0 == idx,
                "param id mismatch: expected {}, got {:?}",
                idx,
                param.id
            );
            ensure!(
                param.manifold.compatible_dim(param.dim),
                "param {} manifold {:?} incompatible with dim {}",
                param.name,
                param.manifold,
                param.dim
            );
            for fixed_idx in param.fixed.iter() {
                ensure!(
                    fixed_idx < param.dim,
                    "param {} fixed index {} out of range",
                    param.name,
                    fixed_idx
                );
            }
        }

        for (r_idx, residual) in self.residuals.iter().enumerate() {
            ensure!(
                residual.residual_dim == residual.factor.residual_dim(),
                "residual {} dim {} does not match factor expectation {}",
                r_idx,
                residual.residual_dim,
                residual.factor.residual_dim()
            );
            for param in &residual.params {
                ensure!(
                    param.0 < self.params.len(),
                    "residual {} references missing param {:?}",
                    r_idx,
                    param
                );
            }

            match &residual.factor {
                FactorKind::Se3Pose {
                    order, components, ..
                } => {
                    let window = order + 1;
                    let groups = usize::from(components.has_rotation())
                        + usize::from(components.has_position());
                    ensure!(
                        residual.params.len() == window * groups,
                        "Se3Pose residual {} expects {} params, got {}",
                        r_idx,
                        window * groups,
                        residual.params.len()
                    );
                    let (rot, pos) = if components.has_rotation() {
                        residual.params.split_at(window)
                    } else {
                        residual.params.split_at(0)
                    };
                    self.expect_blocks(rot, 4, ManifoldKind::SO3, "Se3Pose rotation knot")?;
                    self.expect_blocks(pos, 3, ManifoldKind::Euclidean, "Se3Pose position knot")?;
                }
                FactorKind::ImuGyro { order, .. } => {
                    let window = order + 1;
                    ensure!(
                        residual.params.len() == window + 3,
                        "ImuGyro residual {} expects {} params [so3 knots, bias, map, sensor_to_body], got {}",
                        r_idx,
                        window + 3,
                        residual.params.len()
                    );
                    let (knots, aux) = residual.params.split_at(window);
                    self.expect_blocks(knots, 4, ManifoldKind::SO3, "ImuGyro rotation knot")?;
                    self.expect_blocks(&aux[0..1], 3, ManifoldKind::Euclidean, "ImuGyro bias")?;
                    self.expect_blocks(&aux[1..2], 6, ManifoldKind::Euclidean, "ImuGyro map coefficients")?;
                    self.expect_blocks(&aux[2..3], 4, ManifoldKind::SO3, "ImuGyro sensor-to-body rotation")?;
                }
                FactorKind::KnotRotationPrior { .. } => {
                    ensure!(
                        residual.params.len() == 1,
                        "KnotRotationPrior residual {} expects 1 param, got {}",
                        r_idx,
                        residual.params.len()
                    );
                    self.expect_blocks(&residual.params, 4, ManifoldKind::SO3, "KnotRotationPrior knot")?;
                }
            }
        }

        Ok(())
    }

    fn expect_blocks(
        &self,
        ids: &[ParamId],
        dim: usize,
        manifold: ManifoldKind,
        what: &str,
    ) -> Result<()> {
        for id in ids {
            let block = &self.params[id.0];
            ensure!(
                block.dim == dim && block.manifold == manifold,
                "{} expects {}D {:?}, got {} with dim={} manifold={:?}",
                what,
                dim,
                manifold,
                block.name,
                block.dim,
                block.manifold
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gyro_factor() -> FactorKind {
        FactorKind::ImuGyro {
            order: 1,
            u: 0.5,
            inv_dt: 10.0,
            gyro: [0.0; 3],
            w: 1.0,
        }
    }

    #[test]
    fn gyro_layout_is_checked() {
        let mut ir = ProblemIR::new();
        let k0 = ir.add_param_block("so3/0", 4, ManifoldKind::SO3, FixedMask::all_free());
        let k1 = ir.add_param_block("so3/1", 4, ManifoldKind::SO3, FixedMask::all_free());
        let bias = ir.add_param_block("gyro_bias", 3, ManifoldKind::Euclidean, FixedMask::all_free());
        let map = ir.add_param_block("gyro_map", 6, ManifoldKind::Euclidean, FixedMask::all_free());
        let ext = ir.add_param_block("so3_sensor_to_body", 4, ManifoldKind::SO3, FixedMask::all_free());

        ir.add_residual_block(ResidualBlock {
            params: vec![k0, k1, bias, map, ext],
            loss: RobustLoss::None,
            factor: gyro_factor(),
            residual_dim: 3,
        });
        assert!(ir.validate().is_ok());

        // Swapping bias and map must be rejected.
        ir.residuals[0].params = vec![k0, k1, map, bias, ext];
        assert!(ir.validate().is_err());
    }

    #[test]
    fn pose_layout_depends_on_components() {
        let mut ir = ProblemIR::new();
        let pos0 = ir.add_param_block("pos/0", 3, ManifoldKind::Euclidean, FixedMask::all_free());
        let pos1 = ir.add_param_block("pos/1", 3, ManifoldKind::Euclidean, FixedMask::all_free());
        let factor = FactorKind::Se3Pose {
            order: 1,
            u: 0.0,
            rotation_xyzw: [0.0, 0.0, 0.0, 1.0],
            translation: [0.0; 3],
            components: Se3Components::Position,
            rot_weight: 1.0,
            pos_weight: 1.0,
        };
        ir.add_residual_block(ResidualBlock {
            params: vec![pos0, pos1],
            loss: RobustLoss::None,
            factor: factor.clone(),
            residual_dim: 3,
        });
        assert!(ir.validate().is_ok());
        assert_eq!(ir.referenced_params().len(), 2);

        ir.residuals[0].residual_dim = 6;
        assert!(ir.validate().is_err());
    }

    #[test]
    fn rotation_prior_takes_one_so3_knot() {
        let mut ir = ProblemIR::new();
        let knot = ir.add_param_block("so3/0", 4, ManifoldKind::SO3, FixedMask::all_free());
        let pos = ir.add_param_block("pos/0", 3, ManifoldKind::Euclidean, FixedMask::all_free());
        let factor = FactorKind::KnotRotationPrior {
            rotation_xyzw: [0.0, 0.0, 0.0, 1.0],
            weight: 0.1,
        };
        ir.add_residual_block(ResidualBlock {
            params: vec![knot],
            loss: RobustLoss::None,
            factor: factor.clone(),
            residual_dim: factor.residual_dim(),
        });
        assert!(ir.validate().is_ok());

        ir.residuals[0].params = vec![pos];
        assert!(ir.validate().is_err());
        ir.residuals[0].params = vec![knot, knot];
        assert!(ir.validate().is_err());
    }

    #[test]
    fn fixed_mask_whole_block() {
        assert!(FixedMask::from_flag(true, 4).is_all_fixed(4));
        assert!(FixedMask::from_flag(false, 4).is_empty());
        let partial = FixedMask {
            fixed_indices: [0, 2].into_iter().collect(),
        };
        assert!(!partial.is_all_fixed(3));
    }
}
