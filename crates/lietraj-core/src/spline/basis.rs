use nalgebra::{DMatrix, DVector, RealField, UnitQuaternion, Vector3};

use crate::lie::{scalar, so3_exp, so3_log};
use crate::Real;

/// Cumulative blending matrix of a uniform B-spline plus the manifold
/// evaluation routines built on it.
///
/// For degree `k` the matrix is `(k+1) x (k+1)`; row `j` holds the polynomial
/// coefficients (in powers of `u`) of the cumulative weight of knot `j` in the
/// window. Evaluation helpers are generic over [`RealField`] so residuals can
/// be differentiated with dual numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineBasis {
    order: usize,
    blending: DMatrix<Real>,
}

impl SplineBasis {
    pub fn new(order: usize) -> Self {
        let n = order + 1;
        let mut m = DMatrix::<Real>::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let mut sum = 0.0;
                for s in j..n {
                    let sign = if (s - j) % 2 == 0 { 1.0 } else { -1.0 };
                    sum += sign
                        * binomial(n, s - j)
                        * ((n - s - 1) as Real).powi((n - 1 - i) as i32);
                }
                m[(j, i)] = binomial(n - 1, n - 1 - i) * sum;
            }
        }

        // Cumulative form: each row becomes the sum of itself and all later rows.
        for i in 0..n {
            for j in (i + 1)..n {
                let later = m.row(j).clone_owned();
                let mut row = m.row_mut(i);
                row += later;
            }
        }

        let factorial: Real = (2..n).map(|v| v as Real).product();
        m /= factorial;

        Self { order, blending: m }
    }

    /// Polynomial degree of the spline.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Cumulative weights (or their `derivative`-th derivative w.r.t. `u`) at `u`.
    pub fn coefficients(&self, u: Real, derivative: usize) -> DVector<Real> {
        let n = self.order + 1;
        let mut powers = DVector::<Real>::zeros(n);
        for i in derivative..n {
            let falling: Real = ((i - derivative + 1)..=i).map(|v| v as Real).product();
            powers[i] = falling * u.powi((i - derivative) as i32);
        }
        &self.blending * powers
    }

    /// Rotation at `u` from a window of `order + 1` knots.
    pub fn evaluate_so3<T: RealField>(&self, knots: &[UnitQuaternion<T>], u: Real) -> UnitQuaternion<T> {
        debug_assert_eq!(knots.len(), self.order + 1, "knot window size");
        let coeff = self.coefficients(u, 0);
        let mut rotation = knots[0].clone();
        for i in 0..self.order {
            let delta = so3_log(&(knots[i].inverse() * &knots[i + 1]));
            rotation *= so3_exp(&(delta * scalar::<T>(coeff[i + 1])));
        }
        rotation
    }

    /// Rotation and body-frame angular velocity at `u`.
    ///
    /// `inv_dt` converts the derivative w.r.t. `u` into a derivative w.r.t. time.
    pub fn evaluate_so3_velocity<T: RealField>(
        &self,
        knots: &[UnitQuaternion<T>],
        u: Real,
        inv_dt: Real,
    ) -> (UnitQuaternion<T>, Vector3<T>) {
        debug_assert_eq!(knots.len(), self.order + 1, "knot window size");
        let coeff = self.coefficients(u, 0);
        let dcoeff = self.coefficients(u, 1);

        let mut rotation = knots[0].clone();
        let mut velocity = Vector3::<T>::zeros();
        for i in 0..self.order {
            let delta = so3_log(&(knots[i].inverse() * &knots[i + 1]));
            let scaled = delta.clone() * scalar::<T>(coeff[i + 1]);
            let step = so3_exp(&scaled);
            velocity = step.inverse_transform_vector(&velocity) + delta * scalar::<T>(dcoeff[i + 1]);
            rotation *= step;
        }
        (rotation, velocity * scalar::<T>(inv_dt))
    }

    /// Euclidean value (`derivative == 0`) or time derivative at `u`.
    pub fn evaluate_rd<T: RealField>(
        &self,
        knots: &[Vector3<T>],
        u: Real,
        inv_dt: Real,
        derivative: usize,
    ) -> Vector3<T> {
        debug_assert_eq!(knots.len(), self.order + 1, "knot window size");
        let coeff = self.coefficients(u, derivative);
        let mut value = &knots[0] * scalar::<T>(coeff[0]);
        for i in 1..=self.order {
            value += (&knots[i] - &knots[i - 1]) * scalar::<T>(coeff[i]);
        }
        value * scalar::<T>(inv_dt.powi(derivative as i32))
    }
}

fn binomial(n: usize, k: usize) -> Real {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as Real / (i + 1) as Real)
}
