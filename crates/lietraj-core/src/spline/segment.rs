use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::SplineError;
use crate::Real;

/// Knot timing of a uniform spline.
///
/// Knot `i` is associated with `start_time + i * dt`; a query at `t` reads the
/// `order + 1` knots starting at `floor((t - start_time) / dt)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplineSegment {
    pub start_time: Real,
    pub dt: Real,
    pub num_knots: usize,
    pub order: usize,
}

impl SplineSegment {
    pub fn min_time(&self) -> Real {
        self.start_time
    }

    /// Exclusive upper bound of the valid time range.
    pub fn max_time(&self) -> Real {
        self.start_time + self.num_segments() as Real * self.dt
    }

    pub fn inv_dt(&self) -> Real {
        1.0 / self.dt
    }

    pub fn num_segments(&self) -> usize {
        self.num_knots.saturating_sub(self.order)
    }

    pub fn contains(&self, t: Real) -> bool {
        t.is_finite() && t >= self.min_time() && t < self.max_time()
    }

    /// Maps `t` to the first knot of its window and the normalized offset `u ∈ [0, 1)`.
    pub fn compute_spline_index(&self, t: Real) -> Result<(usize, Real), SplineError> {
        if !self.contains(t) {
            return Err(SplineError::OutOfRange {
                t,
                min: self.min_time(),
                max: self.max_time(),
            });
        }
        let x = (t - self.start_time) / self.dt;
        let base = x.floor();
        let last = self.num_segments() - 1;
        let index = base as usize;
        if index > last {
            // `t < max_time` but the division rounded up onto the end of the range.
            return Ok((last, (x - last as Real).min(1.0 - Real::EPSILON)));
        }
        Ok((index, x - base))
    }

    /// Knot index range read at `t` together with `u`.
    pub fn window(&self, t: Real) -> Result<(Range<usize>, Real), SplineError> {
        let (index, u) = self.compute_spline_index(t)?;
        Ok((index..index + self.order + 1, u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> SplineSegment {
        SplineSegment {
            start_time: 1.5,
            dt: 0.1,
            num_knots: 23,
            order: 3,
        }
    }

    #[test]
    fn index_reconstructs_time() {
        let seg = segment();
        for i in 0..200 {
            let t = seg.min_time() + i as Real * 0.00999;
            let (index, u) = seg.compute_spline_index(t).unwrap();
            assert!((0.0..1.0).contains(&u), "u {u} at t {t}");
            assert!(index + seg.order < seg.num_knots);
            let back = seg.start_time + (index as Real + u) * seg.dt;
            assert!((back - t).abs() < 1e-12, "t {t} reconstructed as {back}");
        }
    }

    #[test]
    fn range_is_half_open() {
        let seg = segment();
        assert!((seg.max_time() - 3.5).abs() < 1e-12);
        assert!(seg.compute_spline_index(seg.min_time()).is_ok());
        assert!(seg.compute_spline_index(seg.max_time()).is_err());
        assert!(seg.compute_spline_index(seg.min_time() - 1e-9).is_err());
        assert!(seg.compute_spline_index(Real::NAN).is_err());

        let (index, u) = seg.compute_spline_index(seg.max_time() - 1e-15).unwrap();
        assert_eq!(index, seg.num_segments() - 1);
        assert!(u < 1.0);
    }

    #[test]
    fn window_covers_order_plus_one_knots() {
        let seg = segment();
        let (range, _) = seg.window(2.05).unwrap();
        assert_eq!(range, 5..9);
    }
}
