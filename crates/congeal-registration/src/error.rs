//! Error types for registration operations.
//!
//! Configuration problems are reported before the first optimizer call;
//! engine failures are propagated unmodified to the caller of the schedule.

use congeal_core::CoreError;
use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Invalid configuration, detected before any optimizer invocation.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The solver could not make progress.
    #[error("Convergence failure: {0}")]
    ConvergenceFailure(String),

    /// Numerical instability detected (non-finite objective or parameters).
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Error reported by an engine implementation.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Writing a checkpoint failed.
    #[error("Checkpoint {label} failed: {message}")]
    Checkpoint { label: String, message: String },

    /// Dimension mismatch.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Geometry error from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a convergence failure error.
    pub fn convergence_failure(msg: impl Into<String>) -> Self {
        Self::ConvergenceFailure(msg.into())
    }

    /// Create a numerical instability error.
    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }

    /// Create an engine error.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a checkpoint error.
    pub fn checkpoint(label: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Checkpoint {
            label: label.into(),
            message: msg.into(),
        }
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Whether this error was raised by the optimizer during `compute()`.
    pub fn is_compute_failure(&self) -> bool {
        matches!(
            self,
            Self::ConvergenceFailure(_) | Self::NumericalInstability(_) | Self::Engine(_)
        )
    }
}
