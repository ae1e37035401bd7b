//! Failure taxonomy for the planner core.
//!
//! Registry/configuration problems are fatal at load time; everything that
//! can go wrong while evaluating a single route candidate is recoverable
//! and only escalates when no candidate survives.

use thiserror::Error;

/// Dimensions of a model input or output, outermost first.
pub type Shape = Vec<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// No sensors loaded; the process cannot serve predictions.
    #[error("sensor registry is empty")]
    EmptyRegistry,

    /// Registry records violate the id/index bijection.
    #[error("invalid sensor registry: {0}")]
    InvalidRegistry(String),

    /// No historical window available and no fallback policy configured.
    #[error("insufficient history: {available} of {required} steps available")]
    InsufficientHistory { required: usize, available: usize },

    /// Model input or output shape violated. Never silently reshaped.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Shape, actual: Shape },

    /// Scaler incompatible with the predicted window. Callers degrade to
    /// normalized-space metrics instead of aborting.
    #[error("denormalization failed: scaler fitted for {fitted} columns, window has {actual}")]
    DenormalizationFailed { fitted: usize, actual: usize },

    /// Caller supplied too few waypoints to order.
    #[error("need at least 2 waypoints, got {got}")]
    InsufficientWaypoints { got: usize },

    /// Exhaustive search is bounded; n! forecast calls must stay tractable.
    #[error("too many waypoints for exhaustive search: {got} exceeds maximum {max}")]
    TooManyWaypoints { got: usize, max: usize },

    /// Every permutation failed to evaluate.
    #[error("no viable route: all {attempted} permutations failed")]
    NoViableRoute { attempted: usize },
}

impl PlanError {
    /// True when the failure is the caller's fault rather than the
    /// service's. Lets API layers map onto client-error vs server-error
    /// outcomes without matching every variant.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PlanError::InsufficientWaypoints { .. } | PlanError::TooManyWaypoints { .. }
        )
    }
}
