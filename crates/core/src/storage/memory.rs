use super::{JobStore, WorkflowStore};
use crate::types::{Job, JobId, JobProgress, JobResult, JobStatus, Workflow, WorkflowId};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local job and workflow store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<T>(&self, job_id: JobId, f: impl FnOnce(&mut Job) -> T) -> Result<T> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| anyhow!("Job {} not found", job_id))?;
        Ok(f(job))
    }
}

#[async_trait::async_trait]
impl JobStore for InMemoryStore {
    async fn save(&self, job: &Job) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&job_id).cloned())
    }

    async fn update_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<bool> {
        self.modify(job_id, |job| job.transition(status, error)).await
    }

    async fn update_progress(&self, job_id: JobId, progress: JobProgress) -> Result<()> {
        self.modify(job_id, |job| job.progress = progress).await
    }

    async fn append_result(&self, job_id: JobId, result: JobResult) -> Result<()> {
        self.modify(job_id, |job| job.results.push(result)).await
    }

    async fn set_output_location(&self, job_id: JobId, location: String) -> Result<()> {
        self.modify(job_id, |job| job.final_output_location = Some(location))
            .await
    }

    async fn list(&self, workflow_id: Option<&WorkflowId>) -> Result<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<Job> = jobs
            .values()
            .filter(|job| workflow_id.map_or(true, |id| &job.workflow_id == id))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(list)
    }
}

#[async_trait::async_trait]
impl WorkflowStore for InMemoryStore {
    async fn save(&self, workflow: &Workflow) -> Result<()> {
        self.workflows
            .write()
            .await
            .insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn get(&self, workflow_id: &WorkflowId) -> Result<Option<Workflow>> {
        Ok(self.workflows.read().await.get(workflow_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Workflow>> {
        let mut list: Vec<Workflow> = self.workflows.read().await.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_status_refuses_illegal_transitions() {
        let store = InMemoryStore::new();
        let job = Job::new(WorkflowId::new("wf"), 1);
        JobStore::save(&store, &job).await.unwrap();

        assert!(!store
            .update_status(job.id, JobStatus::Completed, None)
            .await
            .unwrap());
        assert!(store
            .update_status(job.id, JobStatus::Cancelled, None)
            .await
            .unwrap());
        assert!(!store
            .update_status(job.id, JobStatus::Running, None)
            .await
            .unwrap());

        let stored = JobStore::get(&store, job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert!(stored.completed_at.is_some());
        assert!(stored.started_at.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_workflow() {
        let store = InMemoryStore::new();
        let first = Job::new(WorkflowId::new("a"), 1);
        let second = Job::new(WorkflowId::new("b"), 1);
        JobStore::save(&store, &first).await.unwrap();
        JobStore::save(&store, &second).await.unwrap();

        assert_eq!(JobStore::list(&store, None).await.unwrap().len(), 2);
        let only_a = JobStore::list(&store, Some(&WorkflowId::new("a")))
            .await
            .unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].id, first.id);
    }

    #[tokio::test]
    async fn test_unknown_job_is_an_error() {
        let store = InMemoryStore::new();
        assert!(store
            .update_progress(JobId::new(), JobProgress::default())
            .await
            .is_err());
    }
}
