//! Geometry validation errors.

use thiserror::Error;

/// Errors raised while constructing frames, joint configurations and
/// trajectories. Everything downstream trusts values that made it through
/// these checks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Degenerate frame axes: {0}")]
    DegenerateFrame(&'static str),

    #[error("Trajectory must contain at least one point")]
    EmptyTrajectory,

    #[error("Trajectory mixes frames and joint configurations at index {index}")]
    MixedTrajectory { index: usize },

    #[error("Joint configuration needs {expected} values, got {actual}")]
    JointCount { expected: usize, actual: usize },

    #[error("Expected {expected} wire values, got {actual}")]
    WireLength { expected: usize, actual: usize },

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}
