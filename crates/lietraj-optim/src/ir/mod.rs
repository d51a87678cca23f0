//! Backend-independent intermediate representation of trajectory problems.

mod types;

pub use types::{
    FactorKind, FixedMask, ManifoldKind, ParamBlock, ParamId, ProblemIR, ResidualBlock,
    RobustLoss, Se3Components,
};
