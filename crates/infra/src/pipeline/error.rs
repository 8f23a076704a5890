use core::fmt;

use thiserror::Error;

use medsupply_core::DomainError;

use crate::store::StoreError;

/// The stage of the pipeline an error came from.
///
/// Collaborators use it to choose a policy: parse and normalize failures are
/// permanent (dead-letter), persist and deliver failures are worth a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Parse,
    Normalize,
    Evaluate,
    Build,
    Persist,
    Deliver,
}

impl PipelineStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStep::Parse => "parse",
            PipelineStep::Normalize => "normalize",
            PipelineStep::Evaluate => "evaluate",
            PipelineStep::Build => "build",
            PipelineStep::Persist => "persist",
            PipelineStep::Deliver => "deliver",
        }
    }

    /// Whether retrying the same input can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineStep::Persist | PipelineStep::Deliver)
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The payload could not be decoded at all.
    #[error("could not decode payload: {0}")]
    Parse(String),

    /// A domain rule rejected the input (normalize, evaluate or build).
    #[error("{step} failed: {source}")]
    Domain {
        step: PipelineStep,
        #[source]
        source: DomainError,
    },

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Emitting the outbound batch failed; nothing was delivered.
    #[error("downstream delivery failed: {0}")]
    Delivery(String),
}

impl PipelineError {
    pub fn domain(step: PipelineStep, source: DomainError) -> Self {
        Self::Domain { step, source }
    }

    pub fn step(&self) -> PipelineStep {
        match self {
            PipelineError::Parse(_) => PipelineStep::Parse,
            PipelineError::Domain { step, .. } => *step,
            PipelineError::Persistence(_) => PipelineStep::Persist,
            PipelineError::Delivery(_) => PipelineStep::Deliver,
        }
    }

    /// Missing or malformed input (as opposed to a failure of this system).
    pub fn is_validation(&self) -> bool {
        match self {
            PipelineError::Parse(_) => true,
            PipelineError::Domain { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}
