use super::{JobStore, WorkflowStore};
use crate::types::{Job, JobId, JobProgress, JobResult, JobStatus, Workflow, WorkflowId};
use anyhow::{anyhow, Context, Result};
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;

/// Records stored as JSON under their string id
type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const JOBS_TABLE: JsonTable = TableDefinition::new("jobs");
const WORKFLOWS_TABLE: JsonTable = TableDefinition::new("workflows");

/// Job and workflow store persisted in a redb file
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create index directory")?;
        }

        let db = Database::create(&path).context("Failed to create redb database")?;

        // Initialize tables
        let write_txn = db.begin_write().context("Failed to begin write transaction")?;
        {
            let _jobs_table = write_txn
                .open_table(JOBS_TABLE)
                .context("Failed to open jobs table")?;
            let _workflows_table = write_txn
                .open_table(WORKFLOWS_TABLE)
                .context("Failed to open workflows table")?;
        }
        write_txn.commit().context("Failed to commit transaction")?;

        Ok(Self { db: Arc::new(db) })
    }

    fn put<T: serde::Serialize>(
        &self,
        table_def: JsonTable,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let write_txn = self.db.begin_write().context("Failed to begin write")?;
        {
            let mut table = write_txn
                .open_table(table_def)
                .context("Failed to open table")?;
            let bytes = serde_json::to_vec(value).context("Failed to serialize record")?;
            table
                .insert(key, bytes.as_slice())
                .context("Failed to insert record")?;
        }
        write_txn.commit().context("Failed to commit")?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        table_def: JsonTable,
        key: &str,
    ) -> Result<Option<T>> {
        let read_txn = self.db.begin_read().context("Failed to begin read")?;
        let table = read_txn.open_table(table_def).context("Failed to open table")?;

        match table.get(key).context("Failed to get record")? {
            Some(guard) => {
                let record = serde_json::from_slice(guard.value())
                    .context("Failed to deserialize record")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, table_def: JsonTable) -> Result<Vec<T>> {
        let read_txn = self.db.begin_read().context("Failed to begin read")?;
        let table = read_txn.open_table(table_def).context("Failed to open table")?;

        let mut records = Vec::new();
        for item in table.iter().context("Failed to iterate table")? {
            let (_key, value) = item.context("Failed to read item")?;
            records.push(
                serde_json::from_slice(value.value()).context("Failed to deserialize record")?,
            );
        }
        Ok(records)
    }

    /// Read, change and write back one job inside a single write transaction
    fn modify_job<T>(&self, job_id: JobId, f: impl FnOnce(&mut Job) -> T) -> Result<T> {
        let write_txn = self.db.begin_write().context("Failed to begin write")?;
        let outcome = {
            let mut table = write_txn
                .open_table(JOBS_TABLE)
                .context("Failed to open jobs table")?;

            let key = job_id.to_string();
            let bytes = match table.get(key.as_str()).context("Failed to get job")? {
                Some(guard) => guard.value().to_vec(),
                None => return Err(anyhow!("Job {} not found", job_id)),
            };

            let mut job: Job = serde_json::from_slice(&bytes).context("Failed to deserialize job")?;
            let outcome = f(&mut job);

            let value = serde_json::to_vec(&job).context("Failed to serialize job")?;
            table
                .insert(key.as_str(), value.as_slice())
                .context("Failed to insert job")?;
            outcome
        };
        write_txn.commit().context("Failed to commit")?;
        Ok(outcome)
    }
}

#[async_trait::async_trait]
impl JobStore for RedbStore {
    async fn save(&self, job: &Job) -> Result<()> {
        self.put(JOBS_TABLE, &job.id.to_string(), job)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>> {
        self.fetch(JOBS_TABLE, &job_id.to_string())
    }

    async fn update_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<bool> {
        self.modify_job(job_id, |job| job.transition(status, error))
    }

    async fn update_progress(&self, job_id: JobId, progress: JobProgress) -> Result<()> {
        self.modify_job(job_id, |job| job.progress = progress)
    }

    async fn append_result(&self, job_id: JobId, result: JobResult) -> Result<()> {
        self.modify_job(job_id, |job| job.results.push(result))
    }

    async fn set_output_location(&self, job_id: JobId, location: String) -> Result<()> {
        self.modify_job(job_id, |job| job.final_output_location = Some(location))
    }

    async fn list(&self, workflow_id: Option<&WorkflowId>) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.scan(JOBS_TABLE)?;
        if let Some(id) = workflow_id {
            jobs.retain(|job| &job.workflow_id == id);
        }
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }
}

#[async_trait::async_trait]
impl WorkflowStore for RedbStore {
    async fn save(&self, workflow: &Workflow) -> Result<()> {
        self.put(WORKFLOWS_TABLE, &workflow.id.0, workflow)
    }

    async fn get(&self, workflow_id: &WorkflowId) -> Result<Option<Workflow>> {
        self.fetch(WORKFLOWS_TABLE, &workflow_id.0)
    }

    async fn list(&self) -> Result<Vec<Workflow>> {
        self.scan(WORKFLOWS_TABLE)
    }
}
