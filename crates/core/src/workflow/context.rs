use super::block_executor::{BlockContext, BlockExecutor, BlockOutcome, ProgressSink};
use super::dag;
use crate::dataset::{Dataset, DatasetStore, Record, MAIN_DATASET_KEY};
use crate::error::{EngineError, EngineResult};
use crate::storage::JobStore;
use crate::table_io::{SaveOptions, TableIo};
use crate::types::{Block, JobId, JobProgress, JobStatus, Workflow};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs one job: plans the workflow, threads datasets through its blocks and
/// records progress, results and the final status in the job store.
pub struct WorkflowRunner {
    job_store: Arc<dyn JobStore>,
    block_executor: Arc<BlockExecutor>,
    table_io: Arc<dyn TableIo>,
    output_dir: PathBuf,
}

/// Writes row-level progress of the running block into the job record
struct JobProgressReporter<'a> {
    job_store: &'a dyn JobStore,
    job_id: JobId,
    base: &'a JobProgress,
}

#[async_trait::async_trait]
impl ProgressSink for JobProgressReporter<'_> {
    async fn rows_processed(&self, block: &Block, processed: usize, total: usize) {
        let progress = JobProgress {
            processed_rows: processed,
            total_rows: total,
            message: format!("{}: {}/{} rows", block.name, processed, total),
            ..self.base.clone()
        };
        if let Err(e) = self.job_store.update_progress(self.job_id, progress).await {
            tracing::warn!("Failed to record progress for job {}: {:#}", self.job_id, e);
        }
    }
}

impl WorkflowRunner {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        block_executor: Arc<BlockExecutor>,
        table_io: Arc<dyn TableIo>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            job_store,
            block_executor,
            table_io,
            output_dir,
        }
    }

    /// Execute `workflow` for a job that is already RUNNING.
    ///
    /// Returns the terminal status the job was moved to. Store failures are
    /// returned as errors and leave the status to the caller.
    pub async fn run(
        &self,
        job_id: JobId,
        workflow: &Workflow,
        input: Option<&Value>,
        cancel: &CancellationToken,
    ) -> EngineResult<JobStatus> {
        tracing::info!(
            "Starting workflow execution: job_id={}, workflow_id={}",
            job_id,
            workflow.id
        );

        let order = match dag::plan(workflow) {
            Ok(order) => order,
            Err(e) => {
                let error = EngineError::from(e);
                let progress = JobProgress::queued(workflow.blocks.len());
                return self.finish_failed(job_id, &progress, error.to_string()).await;
            }
        };

        let blocks: HashMap<_, _> = workflow.blocks.iter().map(|b| (&b.id, b)).collect();
        let total = order.len();

        let mut datasets = DatasetStore::new();
        if let Some(records) = input_records(input) {
            let mut metadata = Map::new();
            metadata.insert("source".to_string(), json!("input_data"));
            datasets.store(MAIN_DATASET_KEY, Dataset::from_records(&records), metadata);
        }

        let mut progress = JobProgress::queued(total);
        let mut current_key = MAIN_DATASET_KEY.to_string();

        for (step, block_id) in order.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.finish_cancelled(job_id, &progress).await;
            }

            let block = blocks.get(block_id).copied().ok_or_else(|| {
                EngineError::BlockExecution(format!("Block {} missing from workflow", block_id))
            })?;

            progress = JobProgress::before_block(step, total, block);
            self.job_store
                .update_progress(job_id, progress.clone())
                .await?;

            let reporter = JobProgressReporter {
                job_store: self.job_store.as_ref(),
                job_id,
                base: &progress,
            };
            let ctx = BlockContext {
                datasets: &mut datasets,
                progress: &reporter,
                cancel,
            };

            match self.block_executor.execute(block, &current_key, ctx).await {
                BlockOutcome::Cancelled => {
                    return self.finish_cancelled(job_id, &progress).await;
                }
                BlockOutcome::Finished { result, output_key } => {
                    let failure = (!result.success).then(|| {
                        result
                            .error
                            .clone()
                            .unwrap_or_else(|| "Unknown error".to_string())
                    });
                    self.job_store.append_result(job_id, result).await?;

                    if let Some(error) = failure {
                        let message = format!("Block {} failed: {}", block.name, error);
                        return self.finish_failed(job_id, &progress, message).await;
                    }
                    if let Some(key) = output_key {
                        current_key = key;
                    }
                }
            }
        }

        if let Some(dataset) = datasets.get(&current_key) {
            if let Some(metadata) = datasets.metadata(&current_key) {
                tracing::debug!("Final dataset '{}' for job {}: {:?}", current_key, job_id, metadata);
            }
            let path = self.output_dir.join(format!("output_{}.csv", job_id));
            if let Err(e) = self
                .table_io
                .save(dataset, &path, &SaveOptions::default())
                .await
            {
                let message = format!("Failed to save final output: {:#}", e);
                return self.finish_failed(job_id, &progress, message).await;
            }
            self.job_store
                .set_output_location(job_id, path.display().to_string())
                .await?;
        }

        self.job_store
            .update_progress(job_id, JobProgress::completed(total))
            .await?;
        self.transition(job_id, JobStatus::Completed, None).await?;

        tracing::info!("Workflow execution completed: job_id={}", job_id);
        Ok(JobStatus::Completed)
    }

    async fn finish_failed(
        &self,
        job_id: JobId,
        progress: &JobProgress,
        error: String,
    ) -> EngineResult<JobStatus> {
        tracing::error!("Workflow execution failed: job_id={}, error={}", job_id, error);
        self.job_store
            .update_progress(job_id, progress.with_message(format!("Workflow failed: {}", error)))
            .await?;
        self.transition(job_id, JobStatus::Failed, Some(error)).await?;
        Ok(JobStatus::Failed)
    }

    async fn finish_cancelled(&self, job_id: JobId, progress: &JobProgress) -> EngineResult<JobStatus> {
        tracing::info!("Workflow execution cancelled: job_id={}", job_id);
        self.job_store
            .update_progress(job_id, progress.with_message("Job cancelled"))
            .await?;
        self.transition(job_id, JobStatus::Cancelled, None).await?;
        Ok(JobStatus::Cancelled)
    }

    async fn transition(
        &self,
        job_id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> EngineResult<()> {
        if !self.job_store.update_status(job_id, status, error).await? {
            tracing::warn!("Job {} could not move to {}", job_id, status);
        }
        Ok(())
    }
}

/// Records submitted with the job: an array of objects, or `{"rows": [...]}`
fn input_records(input: Option<&Value>) -> Option<Vec<Record>> {
    let rows = match input? {
        Value::Array(rows) => rows,
        Value::Object(object) => object.get("rows")?.as_array()?,
        _ => return None,
    };
    rows.iter().map(|row| row.as_object().cloned()).collect()
}
