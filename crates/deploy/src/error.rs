//! Deployment errors tagged with the stage that failed.

use crate::{ChainError, stages::Stage};

/// A later step was attempted without a confirmed result from an earlier one.
///
/// This indicates a defect in the caller, never a chain condition.
#[derive(Debug, thiserror::Error)]
#[error("sequencing violation: {0}")]
pub struct SequencingViolation(pub String);

/// What went wrong in a failed stage.
#[derive(Debug, thiserror::Error)]
pub enum DeployFailure {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Sequencing(#[from] SequencingViolation),
}

/// Classification of a [`DeployError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    Submission,
    Confirmation,
    SequencingViolation,
}

/// Terminal failure of a deployment run.
///
/// Partial deployments are left on chain; the stage tells which artifacts of
/// the run survived (everything before it).
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed")]
pub struct DeployError {
    pub stage: Stage,
    #[source]
    pub failure: DeployFailure,
}

impl DeployError {
    pub fn new(stage: Stage, failure: impl Into<DeployFailure>) -> Self {
        Self {
            stage,
            failure: failure.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.failure {
            DeployFailure::Chain(ChainError::Submission { .. }) => ErrorKind::Submission,
            DeployFailure::Chain(ChainError::Confirmation { .. }) => ErrorKind::Confirmation,
            DeployFailure::Sequencing(_) => ErrorKind::SequencingViolation,
        }
    }
}
