//! Gyroscope intrinsics: additive bias and scale/misalignment map.

use anyhow::{ensure, Result};
use lietraj_core::{Mat3, Vec3};
use nalgebra::{DVector, DVectorView, Matrix3, RealField};
use serde::{Deserialize, Serialize};

/// Number of free entries of the gyro map.
pub const GYRO_MAP_DIM: usize = 6;

/// Gyroscope bias `b` and map `M` in `gyro = M * ω + b`.
///
/// `M` is upper triangular. Its six free entries are stored as
/// `[m00, m11, m22, m01, m02, m12]`; the strict lower triangle has no storage
/// and is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroIntrinsics {
    pub bias: Vec3,
    pub map_coeff: [f64; GYRO_MAP_DIM],
}

impl Default for GyroIntrinsics {
    fn default() -> Self {
        Self {
            bias: Vec3::zeros(),
            map_coeff: [1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl GyroIntrinsics {
    /// Builds intrinsics from an upper-triangular map.
    pub fn from_matrix(bias: Vec3, map: &Mat3) -> Result<Self> {
        ensure!(
            map[(1, 0)] == 0.0 && map[(2, 0)] == 0.0 && map[(2, 1)] == 0.0,
            "gyro map must be upper triangular, got {}",
            map
        );
        Ok(Self {
            bias,
            map_coeff: [
                map[(0, 0)],
                map[(1, 1)],
                map[(2, 2)],
                map[(0, 1)],
                map[(0, 2)],
                map[(1, 2)],
            ],
        })
    }

    pub fn map_matrix(&self) -> Mat3 {
        let c = DVector::from_column_slice(&self.map_coeff);
        gyro_map_matrix(c.as_view())
    }

    pub fn map_to_dvec(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.map_coeff)
    }

    pub fn bias_to_dvec(&self) -> DVector<f64> {
        nalgebra::dvector![self.bias.x, self.bias.y, self.bias.z]
    }

    /// Rebuilds intrinsics from optimized `bias` (3D) and `map` (6D) blocks.
    pub fn from_dvecs(bias: DVectorView<'_, f64>, map: DVectorView<'_, f64>) -> Result<Self> {
        ensure!(bias.len() == 3, "gyro bias must be 3D, got {}", bias.len());
        ensure!(
            map.len() == GYRO_MAP_DIM,
            "gyro map must be {}D, got {}",
            GYRO_MAP_DIM,
            map.len()
        );
        let mut map_coeff = [0.0; GYRO_MAP_DIM];
        for (dst, src) in map_coeff.iter_mut().zip(map.iter()) {
            *dst = *src;
        }
        Ok(Self {
            bias: Vec3::new(bias[0], bias[1], bias[2]),
            map_coeff,
        })
    }
}

/// Upper-triangular gyro map from its six coefficients.
pub fn gyro_map_matrix<T: RealField>(c: DVectorView<'_, T>) -> Matrix3<T> {
    debug_assert_eq!(c.len(), GYRO_MAP_DIM);
    Matrix3::new(
        c[0].clone(),
        c[3].clone(),
        c[4].clone(),
        T::zero(),
        c[1].clone(),
        c[5].clone(),
        T::zero(),
        T::zero(),
        c[2].clone(),
    )
}
