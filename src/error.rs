//! Error types for the engine.
//!
//! Errors are split by layer: model construction, evaluation inside a world,
//! proposal moves, and configuration validation. `EngineError` wraps them all
//! and answers the two questions a driver cares about: can the current
//! proposal simply be rejected (`is_recoverable`), or must the run stop
//! (`is_fatal`).

use thiserror::Error;

use crate::distrib::DistribError;

/// Validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("Parameter '{field}' must be finite and positive, got {value}")]
    NonPositive {
        field: String,
        value: f64,
    },

    #[error("Parameter '{field}' must be greater than zero")]
    Zero {
        field: String,
    },
}

/// Errors raised while building or querying the model description.
///
/// These correspond to configuration failures: they abort initialization.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Type '{name}' already declared")]
    DuplicateType {
        name: String,
    },

    #[error("Type '{name}' is not declared")]
    UnknownType {
        name: String,
    },

    #[error("Symbol '{name}' already declared")]
    DuplicateSymbol {
        name: String,
    },

    #[error("Function {signature} already defined")]
    DuplicateFunction {
        signature: String,
    },

    #[error("No function matches {signature}")]
    UnknownFunction {
        signature: String,
    },

    #[error("Type '{ty}' has no origin pattern with {arity} argument(s)")]
    MissingOriginPattern {
        ty: String,
        arity: usize,
    },

    #[error("Conflicting evidence for {var}: {existing} vs {observed}")]
    ConflictingEvidence {
        var: String,
        existing: String,
        observed: String,
    },

    #[error("Object {object} is not a guaranteed object of type '{ty}'")]
    NotGuaranteed {
        object: String,
        ty: String,
    },
}

/// Errors raised while evaluating or assigning variables in a world.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Cyclic dependency while instantiating {var}: {path}")]
    CyclicDependency {
        var: String,
        path: String,
    },

    #[error("Type mismatch for {var}: expected {expected}, got {actual}")]
    TypeMismatch {
        var: String,
        expected: String,
        actual: String,
    },

    #[error("{var} has no value and no dependency model to derive one")]
    Uninstantiable {
        var: String,
    },

    #[error("{var} does not belong to this model")]
    UnknownVariable {
        var: String,
    },

    #[error("Object {object} was generated by another world lineage")]
    ForeignObject {
        object: String,
    },

    #[error("Distribution error: {0}")]
    Distribution(#[from] DistribError),
}

/// Errors raised by proposers.
#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("No variable is eligible for the conditional sampler ({candidates} basic variable(s) scanned)")]
    NoEligibleVariable {
        candidates: usize,
    },

    #[error("Proposer used before initialize()")]
    NotInitialized,
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ModelError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    #[error("Proposal error: {0}")]
    Proposal(#[from] ProposalError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl From<DistribError> for EngineError {
    fn from(err: DistribError) -> Self {
        Self::Evaluation(EvalError::Distribution(err))
    }
}

impl EngineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Validation(_))
    }

    /// Returns true for a cyclic dependency.
    #[must_use]
    pub const fn is_cyclic_dependency(&self) -> bool {
        matches!(self, Self::Evaluation(EvalError::CyclicDependency { .. }))
    }

    /// Returns true for a type mismatch.
    #[must_use]
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::Evaluation(EvalError::TypeMismatch { .. }))
    }

    /// Returns true if the driver may reject the current proposal and go on.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.is_cyclic_dependency()
    }

    /// Returns true if the run must stop.
    ///
    /// A stalled Gibbs chain is fatal: silently skipping would bias results.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::Validation(_) | Self::Internal { .. } | Self::Proposal(_) => true,
            Self::Evaluation(_) => false,
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
