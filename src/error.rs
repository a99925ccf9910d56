//! Error type shared by the whole crate.

use thiserror::Error;

/// Errors that abort a VMC run.
///
/// None of them is recoverable for the current run: there is no partial
/// result worth keeping once the chain cannot proceed.
#[derive(Debug, Error)]
pub enum VmcError {
    /// Missing or malformed weight file, or a dimension mismatch.
    #[error("cannot load wavefunction: {0}")]
    Load(String),

    /// Invalid run parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A request that cannot be honoured for the current system.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The look-up table no longer matches the spin configuration.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
