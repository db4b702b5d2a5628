use std::fmt;

use model::{ArithmeticError, SampleId};
use sources::SourceError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Sample,
    Aggregate,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Sample => "sample",
            RecordKind::Aggregate => "aggregate",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum AccumulatorError {
    /// The last pointer references a record that does not exist. The chain
    /// must not be re-bootstrapped over it.
    #[error("state corruption: last pointer references missing {kind} {id}")]
    StateCorruption { kind: RecordKind, id: SampleId },

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),

    #[error("price source failed: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AccumulatorError {
    /// Fatal errors mean the deployment must halt; the rest may succeed on
    /// redelivery of the same observation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AccumulatorError::StateCorruption { .. } | AccumulatorError::Arithmetic(_)
        )
    }
}
