use std::iter::FusedIterator;

use super::PoseSpline;
use crate::{Pose, Real};

/// Lazy iterator over poses at `min_time + i * step` for every `t < max_time`.
///
/// Cloning the iterator, or calling [`PoseSpline::sampling`] again, restarts
/// the sequence.
#[derive(Debug, Clone)]
pub struct PoseSampling<'a> {
    spline: &'a PoseSpline,
    step: Real,
    index: usize,
}

impl<'a> PoseSampling<'a> {
    pub(super) fn new(spline: &'a PoseSpline, step: Real) -> Self {
        Self {
            spline,
            step,
            index: 0,
        }
    }
}

impl Iterator for PoseSampling<'_> {
    type Item = Pose;

    fn next(&mut self) -> Option<Pose> {
        let t = self.spline.min_time() + self.index as Real * self.step;
        let pose = self.spline.pose(t).ok()?;
        self.index += 1;
        Some(pose)
    }
}

impl FusedIterator for PoseSampling<'_> {}
