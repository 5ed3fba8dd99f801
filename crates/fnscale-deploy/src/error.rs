//! Deployment lifecycle error types.

use thiserror::Error;

use fnscale_autoscale::ComposeError;
use fnscale_core::DeployStatus;

/// Result type alias for lifecycle operations.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors surfaced by the lifecycle tracker and deploy pipeline.
///
/// Transport failures while polling are not here: they degrade to
/// `DeployStatus::Unknown` and polling continues.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("submitting {image} failed: {diagnostic}")]
    SubmissionFailed { image: String, diagnostic: String },

    /// `last_status` is the last status a poll returned. With `polls == 0`
    /// nothing was observed and it holds the assumed initial `Pending`.
    #[error("deployment {id} did not finish after {polls} polls (last status: {last_status})")]
    DeploymentTimedOut {
        id: String,
        last_status: DeployStatus,
        polls: u32,
    },

    /// Same `last_status` rule as `DeploymentTimedOut`.
    #[error("waiting for deployment {id} was cancelled (last status: {last_status})")]
    Cancelled { id: String, last_status: DeployStatus },

    #[error("deployment {id} failed")]
    DeploymentFailed { id: String },

    #[error("{} trigger binding(s) failed validation", .0.len())]
    Composition(Vec<ComposeError>),

    #[error("applying autoscaler manifests failed: {diagnostic}")]
    ApplyFailed { diagnostic: String },
}

impl DeployError {
    /// Last observed status, for the errors that carry one.
    pub fn last_status(&self) -> Option<DeployStatus> {
        match self {
            DeployError::DeploymentTimedOut { last_status, .. }
            | DeployError::Cancelled { last_status, .. } => Some(*last_status),
            DeployError::DeploymentFailed { .. } => Some(DeployStatus::Failed),
            _ => None,
        }
    }
}
