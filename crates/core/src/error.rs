//! Error types for the execution engine.

use crate::types::{JobId, WorkflowId};
use crate::workflow::dag::PlanError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error types raised while planning, executing or scheduling jobs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The workflow graph could not be ordered.
    #[error(transparent)]
    Planning(#[from] PlanError),

    /// Block parameters are missing or malformed.
    #[error("Invalid block configuration: {0}")]
    BlockConfig(String),

    /// A block failed while running.
    #[error("{0}")]
    BlockExecution(String),

    /// A filter condition could not be parsed or evaluated.
    #[error("Invalid filter condition: {0}")]
    InvalidFilter(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Cancellation was requested while the job was running.
    #[error("Job cancelled")]
    Cancelled,

    #[error("Scheduler is shutting down")]
    ShuttingDown,

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// A store or other collaborator failed.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
