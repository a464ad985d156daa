//! Shared fixtures for engine tests.

use crate::dataset::Record;
use crate::enrichment::EnrichmentService;
use crate::storage::{InMemoryStore, JobStore};
use crate::types::{Block, Job, JobId, JobProgress, JobResult, JobStatus, WorkflowId};
use crate::workflow::block_executor::ProgressSink;
use anyhow::{bail, Result};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Ten people, four of them older than 30
pub fn people_csv() -> &'static str {
    "name,age,company\n\
     Ada,36,Acme\n\
     Lin,29,Initech\n\
     Sam,31,Globex\n\
     Kim,22,Acme\n\
     Ola,45,Umbrella\n\
     Raj,30,Initech\n\
     Eve,27,Globex\n\
     Tom,19,Acme\n\
     Zoe,52,Hooli\n\
     Ben,25,Hooli\n"
}

/// Fake enrichment service: deterministic answers, scripted failures
#[derive(Default)]
pub struct ScriptedEnrichment {
    failing_names: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedEnrichment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call for records whose `name` is `name`
    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing_names.insert(name.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, record: &Record) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        if self.failing_names.contains(&name) {
            bail!("no match for {}", name);
        }
        Ok(name)
    }
}

#[async_trait::async_trait]
impl EnrichmentService for ScriptedEnrichment {
    async fn enrich_record(&self, record: &Record, schema: &Map<String, Value>) -> Result<Record> {
        let name = self.respond(record).await?;
        Ok(schema
            .keys()
            .map(|field| (field.clone(), json!(format!("{} of {}", field, name))))
            .collect())
    }

    async fn find_contact(&self, record: &Record) -> Result<Record> {
        let name = self.respond(record).await?;
        let mut response = Map::new();
        response.insert(
            "email".to_string(),
            json!(format!("{}@example.com", name.to_lowercase())),
        );
        Ok(response)
    }
}

/// Progress sink that drops every update
pub struct NoProgress;

#[async_trait::async_trait]
impl ProgressSink for NoProgress {
    async fn rows_processed(&self, _block: &Block, _processed: usize, _total: usize) {}
}

/// Job store that remembers every progress update it receives
#[derive(Default)]
pub struct RecordingJobStore {
    inner: InMemoryStore,
    progress: Mutex<Vec<JobProgress>>,
}

impl RecordingJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress_updates(&self) -> Vec<JobProgress> {
        self.progress.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl JobStore for RecordingJobStore {
    async fn save(&self, job: &Job) -> Result<()> {
        JobStore::save(&self.inner, job).await
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>> {
        JobStore::get(&self.inner, job_id).await
    }

    async fn update_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<bool> {
        self.inner.update_status(job_id, status, error).await
    }

    async fn update_progress(&self, job_id: JobId, progress: JobProgress) -> Result<()> {
        self.progress.lock().unwrap().push(progress.clone());
        self.inner.update_progress(job_id, progress).await
    }

    async fn append_result(&self, job_id: JobId, result: JobResult) -> Result<()> {
        self.inner.append_result(job_id, result).await
    }

    async fn set_output_location(&self, job_id: JobId, location: String) -> Result<()> {
        self.inner.set_output_location(job_id, location).await
    }

    async fn list(&self, workflow_id: Option<&WorkflowId>) -> Result<Vec<Job>> {
        JobStore::list(&self.inner, workflow_id).await
    }
}
