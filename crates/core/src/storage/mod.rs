pub mod memory;
pub mod redb_store;

pub use memory::InMemoryStore;
pub use redb_store::RedbStore;

use crate::types::{Job, JobId, JobProgress, JobResult, JobStatus, Workflow, WorkflowId};
use anyhow::Result;

/// Persistent job records.
///
/// Status changes follow the job state machine; `update_status` refuses an
/// illegal transition by returning `Ok(false)` and leaving the job untouched.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace a job record
    async fn save(&self, job: &Job) -> Result<()>;

    async fn get(&self, job_id: JobId) -> Result<Option<Job>>;

    async fn update_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<bool>;

    async fn update_progress(&self, job_id: JobId, progress: JobProgress) -> Result<()>;

    async fn append_result(&self, job_id: JobId, result: JobResult) -> Result<()>;

    async fn set_output_location(&self, job_id: JobId, location: String) -> Result<()>;

    /// Jobs oldest first, optionally for one workflow
    async fn list(&self, workflow_id: Option<&WorkflowId>) -> Result<Vec<Job>>;
}

/// Workflow definitions
#[async_trait::async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn save(&self, workflow: &Workflow) -> Result<()>;

    async fn get(&self, workflow_id: &WorkflowId) -> Result<Option<Workflow>>;

    async fn list(&self) -> Result<Vec<Workflow>>;
}
