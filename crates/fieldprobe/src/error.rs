//! Probe errors.
//!
//! # Error Categories
//!
//! - **Index errors**: [`ProbeError::OutOfRange`]
//! - **Contract errors**: [`ProbeError::DimensionMismatch`], [`ProbeError::InvalidConfig`]
//! - **Evaluation errors**: [`ProbeError::Evaluation`]
//! - **Collaborator errors**: [`ProbeError::Comm`], [`ProbeError::Sink`]
//!
//! None of these are retried. Index and contract errors mean the caller broke
//! a precondition; evaluation errors mean the field could not be evaluated at
//! a point that was owned at construction.

use thiserror::Error;

use crate::comm::CommError;
use crate::sink::SinkError;

/// Probe result type alias.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors raised by [`Probe`](crate::Probe) and
/// [`ProbeCollection`](crate::ProbeCollection) operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// An index into the local probes, a history or the components was
    /// outside its valid bounds.
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        /// Which index space was addressed.
        what: &'static str,
        /// The offending index.
        index: usize,
        /// Number of valid entries.
        len: usize,
    },

    /// A value vector or point did not have the expected length.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The field could not be evaluated at a locally owned probe.
    #[error("evaluation failed at probe {id}: {message}")]
    Evaluation {
        /// Global id of the probe.
        id: usize,
        /// Collaborator message.
        message: String,
    },

    /// A probe dictionary was asked to probe a component with no field.
    #[error("no field supplied for component {0}")]
    FieldNotFound(String),

    #[error("invalid probe config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Comm(#[from] CommError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl ProbeError {
    /// Create an OutOfRange error.
    pub fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::OutOfRange { what, index, len }
    }
}
