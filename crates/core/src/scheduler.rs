use crate::config::EngineConfig;
use crate::enrichment::EnrichmentService;
use crate::error::{EngineError, EngineResult};
use crate::storage::{JobStore, WorkflowStore};
use crate::table_io::TableIo;
use crate::types::{Job, JobId, JobStatus, SchedulerStats, Workflow, WorkflowId};
use crate::workflow::{BlockExecutor, WorkflowRunner};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SHUTDOWN_MESSAGE: &str = "Scheduler shut down before the job started";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A submitted job waiting for a worker
struct QueuedJob {
    job_id: JobId,
    workflow: Workflow,
    input: Option<Value>,
}

/// FIFO admission queue shared by all workers
#[derive(Default)]
struct AdmissionQueue {
    items: Mutex<VecDeque<QueuedJob>>,
    available: Notify,
}

impl AdmissionQueue {
    fn push(&self, job: QueuedJob) {
        lock(&self.items).push_back(job);
        self.available.notify_one();
    }

    /// Put a job back at the head, used when a worker dequeues during shutdown
    fn push_front(&self, job: QueuedJob) {
        lock(&self.items).push_front(job);
    }

    fn try_pop(&self) -> Option<QueuedJob> {
        let mut items = lock(&self.items);
        let job = items.pop_front();
        if job.is_some() && !items.is_empty() {
            // Let another idle worker pick up the rest
            self.available.notify_one();
        }
        job
    }

    async fn pop(&self) -> QueuedJob {
        loop {
            if let Some(job) = self.try_pop() {
                return job;
            }
            self.available.notified().await;
        }
    }

    fn len(&self) -> usize {
        lock(&self.items).len()
    }

    fn drain(&self) -> Vec<QueuedJob> {
        lock(&self.items).drain(..).collect()
    }
}

/// Bookkeeping for a job a worker is executing
struct RunningJob {
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
}

type RunningJobs = Arc<Mutex<HashMap<JobId, RunningJob>>>;

/// One worker loop's view of the shared scheduler state
#[derive(Clone)]
struct Worker {
    job_store: Arc<dyn JobStore>,
    runner: Arc<WorkflowRunner>,
    queue: Arc<AdmissionQueue>,
    running_jobs: RunningJobs,
    shutdown: Arc<AtomicBool>,
    shutdown_token: CancellationToken,
    poll_interval: Duration,
}

impl Worker {
    async fn run(self, name: String) {
        tracing::info!("Worker {} started", name);

        while !self.shutdown.load(Ordering::SeqCst) {
            let next = tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                next = tokio::time::timeout(self.poll_interval, self.queue.pop()) => next,
            };
            let queued = match next {
                Ok(queued) => queued,
                Err(_) => continue,
            };

            if self.shutdown.load(Ordering::SeqCst) {
                self.queue.push_front(queued);
                break;
            }

            self.process(queued).await;
        }

        tracing::info!("Worker {} stopped", name);
    }

    async fn process(&self, queued: QueuedJob) {
        let QueuedJob {
            job_id,
            workflow,
            input,
        } = queued;

        // Register before RUNNING so a concurrent cancel always finds the token
        let cancel = self.shutdown_token.child_token();
        let (finished_tx, finished_rx) = watch::channel(false);
        lock(&self.running_jobs).insert(
            job_id,
            RunningJob {
                cancel: cancel.clone(),
                finished: finished_rx,
            },
        );

        match self
            .job_store
            .update_status(job_id, JobStatus::Running, None)
            .await
        {
            Ok(true) => {
                tracing::info!("Processing job {} (workflow {})", job_id, workflow.id);
                self.execute(job_id, workflow, input, cancel).await;
            }
            Ok(false) => {
                tracing::info!("Skipping job {}: no longer pending", job_id);
            }
            Err(e) => {
                tracing::error!("Failed to start job {}: {:#}", job_id, e);
            }
        }

        lock(&self.running_jobs).remove(&job_id);
        let _ = finished_tx.send(true);
    }

    async fn execute(
        &self,
        job_id: JobId,
        workflow: Workflow,
        input: Option<Value>,
        cancel: CancellationToken,
    ) {
        let runner = self.runner.clone();
        let handle = tokio::spawn(async move {
            runner
                .run(job_id, &workflow, input.as_ref(), &cancel)
                .await
        });

        let failure = match handle.await {
            Ok(Ok(status)) => {
                tracing::info!("Job {} finished with status {}", job_id, status);
                None
            }
            Ok(Err(e)) => Some(format!("Job execution failed: {}", e)),
            Err(e) => Some(format!("Job execution task failed: {}", e)),
        };

        if let Some(error) = failure {
            tracing::error!("Job {}: {}", job_id, error);
            if let Err(e) = self
                .job_store
                .update_status(job_id, JobStatus::Failed, Some(error))
                .await
            {
                tracing::error!("Failed to mark job {} as failed: {:#}", job_id, e);
            }
        }
    }
}

/// Bounded-concurrency job scheduler with a FIFO admission queue
pub struct JobScheduler {
    pool_size: usize,
    job_store: Arc<dyn JobStore>,
    workflow_store: Arc<dyn WorkflowStore>,
    worker: Worker,
    worker_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl JobScheduler {
    /// Create a scheduler wired to the given stores and collaborators
    pub fn new(
        config: &EngineConfig,
        job_store: Arc<dyn JobStore>,
        workflow_store: Arc<dyn WorkflowStore>,
        table_io: Arc<dyn TableIo>,
        enrichment: Arc<dyn EnrichmentService>,
    ) -> Self {
        let block_executor = Arc::new(BlockExecutor::new(
            table_io.clone(),
            enrichment,
            config.upload_dir.clone(),
            config.default_batch_size,
        ));
        let runner = Arc::new(WorkflowRunner::new(
            job_store.clone(),
            block_executor,
            table_io,
            config.output_dir(),
        ));

        let worker = Worker {
            job_store: job_store.clone(),
            runner,
            queue: Arc::new(AdmissionQueue::default()),
            running_jobs: Arc::new(Mutex::new(HashMap::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_token: CancellationToken::new(),
            poll_interval: config.poll_interval(),
        };

        Self {
            pool_size: config.pool_size.max(1),
            job_store,
            workflow_store,
            worker,
            worker_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.worker.shutdown.load(Ordering::SeqCst) {
            tracing::warn!("Job scheduler has been stopped and cannot be restarted");
            return;
        }

        let mut tasks = lock(&self.worker_tasks);
        if !tasks.is_empty() {
            tracing::warn!("Job scheduler already started");
            return;
        }

        for i in 0..self.pool_size {
            let worker = self.worker.clone();
            tasks.push(tokio::spawn(worker.run(format!("worker-{}", i))));
        }

        tracing::info!("Job scheduler started with {} workers", self.pool_size);
    }

    /// Stop accepting work, cancel running jobs and shut the workers down.
    ///
    /// Jobs still waiting in the queue are marked CANCELLED.
    pub async fn stop(&self) {
        tracing::info!("Stopping job scheduler...");
        self.worker.shutdown.store(true, Ordering::SeqCst);
        // Cancels every running job's token as well
        self.worker.shutdown_token.cancel();

        let running: Vec<(JobId, watch::Receiver<bool>)> = lock(&self.worker.running_jobs)
            .iter()
            .map(|(id, job)| (*id, job.finished.clone()))
            .collect();
        for (job_id, mut finished) in running {
            tracing::info!("Waiting for job {} to stop", job_id);
            let _ = finished.wait_for(|done| *done).await;
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.worker_tasks));
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("Worker task ended abnormally: {}", e);
            }
        }

        for queued in self.worker.queue.drain() {
            match self
                .job_store
                .update_status(queued.job_id, JobStatus::Cancelled, Some(SHUTDOWN_MESSAGE.to_string()))
                .await
            {
                Ok(true) => tracing::info!("Cancelled queued job {}", queued.job_id),
                Ok(false) => {}
                Err(e) => tracing::error!("Failed to cancel queued job {}: {:#}", queued.job_id, e),
            }
        }

        lock(&self.worker.running_jobs).clear();
        tracing::info!("Job scheduler stopped");
    }

    /// Create a PENDING job for `workflow` and queue it
    pub async fn submit(&self, workflow: Workflow, input: Option<Value>) -> EngineResult<JobId> {
        if self.worker.shutdown.load(Ordering::SeqCst) {
            return Err(EngineError::ShuttingDown);
        }

        let job = Job::new(workflow.id.clone(), workflow.blocks.len());
        self.job_store.save(&job).await?;

        tracing::info!("Submitted job {} for workflow {}", job.id, workflow.id);
        self.worker.queue.push(QueuedJob {
            job_id: job.id,
            workflow,
            input,
        });

        Ok(job.id)
    }

    /// Submit a workflow stored in the workflow store
    pub async fn submit_by_id(
        &self,
        workflow_id: &WorkflowId,
        input: Option<Value>,
    ) -> EngineResult<JobId> {
        let workflow = self
            .workflow_store
            .get(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.clone()))?;
        self.submit(workflow, input).await
    }

    /// Cancel a job. Returns true iff the job ends up CANCELLED.
    ///
    /// For a running job this waits until its worker has stopped it.
    pub async fn cancel(&self, job_id: JobId) -> EngineResult<bool> {
        let running = lock(&self.worker.running_jobs)
            .get(&job_id)
            .map(|job| (job.cancel.clone(), job.finished.clone()));

        if let Some((token, mut finished)) = running {
            tracing::info!("Cancelling running job {}", job_id);
            token.cancel();
            let _ = finished.wait_for(|done| *done).await;

            // The job may have been dequeued but not started yet
            self.job_store
                .update_status(job_id, JobStatus::Cancelled, None)
                .await?;
            let cancelled = self
                .job_store
                .get(job_id)
                .await?
                .map_or(false, |job| job.status == JobStatus::Cancelled);
            return Ok(cancelled);
        }

        match self.job_store.get(job_id).await? {
            Some(job) if job.status == JobStatus::Pending => {
                let cancelled = self
                    .job_store
                    .update_status(job_id, JobStatus::Cancelled, None)
                    .await?;
                if cancelled {
                    tracing::info!("Cancelled pending job {}", job_id);
                }
                Ok(cancelled)
            }
            Some(job) => {
                tracing::debug!("Job {} is {}, nothing to cancel", job_id, job.status);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    pub async fn get_job(&self, job_id: JobId) -> EngineResult<Job> {
        self.job_store
            .get(job_id)
            .await?
            .ok_or(EngineError::JobNotFound(job_id))
    }

    /// Jobs oldest first, optionally narrowed to one workflow and status
    pub async fn list_jobs(
        &self,
        workflow_id: Option<&WorkflowId>,
        status: Option<JobStatus>,
    ) -> EngineResult<Vec<Job>> {
        let mut jobs = self.job_store.list(workflow_id).await?;
        if let Some(status) = status {
            jobs.retain(|job| job.status == status);
        }
        Ok(jobs)
    }

    pub fn stats(&self) -> SchedulerStats {
        let active_worker_count = lock(&self.worker_tasks)
            .iter()
            .filter(|task| !task.is_finished())
            .count();

        SchedulerStats {
            running_count: lock(&self.worker.running_jobs).len(),
            queue_depth: self.worker.queue.len(),
            pool_size: self.pool_size,
            active_worker_count,
            is_shutting_down: self.worker.shutdown.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::table_io::CsvTableIo;
    use crate::testing::{people_csv, ScriptedEnrichment};
    use crate::types::{Block, BlockKind};
    use serde_json::json;
    use std::path::Path;
    use std::time::Instant;
    use tempfile::TempDir;

    fn scheduler(dir: &Path, pool_size: usize, enrichment: ScriptedEnrichment) -> (JobScheduler, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let config = EngineConfig {
            pool_size,
            poll_interval_ms: 20,
            upload_dir: dir.to_path_buf(),
            output_dir: None,
            default_batch_size: 10,
        };
        let scheduler = JobScheduler::new(
            &config,
            store.clone(),
            store.clone(),
            Arc::new(CsvTableIo::new()),
            Arc::new(enrichment),
        );
        (scheduler, store)
    }

    async fn wait_for<F>(scheduler: &JobScheduler, job_id: JobId, done: F) -> Job
    where
        F: Fn(&Job) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let job = scheduler.get_job(job_id).await.unwrap();
            if done(&job) {
                return job;
            }
            assert!(Instant::now() < deadline, "timed out waiting on job {}", job_id);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn filter_workflow() -> Workflow {
        Workflow::new("adults", "Adults")
            .with_block(Block::new("A", BlockKind::LoadTable, "Load").with_param("file_path", "people.csv"))
            .with_block(Block::new("B", BlockKind::Filter, "Over 30").with_param("condition", "age > 30"))
            .with_block(Block::new("C", BlockKind::SaveTable, "Save").with_param("file_path", "adults.csv"))
            .connect("A", "B")
            .connect("B", "C")
    }

    fn slow_enrich_workflow() -> Workflow {
        Workflow::new("slow", "Slow")
            .with_block(Block::new("E", BlockKind::EnrichRecord, "Enrich").with_param("struct", json!({"title": "Job title"})))
    }

    #[tokio::test]
    async fn test_submitted_job_completes() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("people.csv"), people_csv()).unwrap();
        let (scheduler, _store) = scheduler(temp_dir.path(), 2, ScriptedEnrichment::new());
        scheduler.start();

        let job_id = scheduler.submit(filter_workflow(), None).await.unwrap();
        let job = wait_for(&scheduler, job_id, |j| j.status.is_terminal()).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.results.len(), 3);
        assert_eq!(job.results[1].rows_output, 4);
        assert!(job.started_at.is_some());
        assert!(job.completed_at.is_some());

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_submit_creates_pending_job() {
        let temp_dir = TempDir::new().unwrap();
        let (scheduler, _store) = scheduler(temp_dir.path(), 1, ScriptedEnrichment::new());

        let job_id = scheduler.submit(filter_workflow(), None).await.unwrap();
        let job = scheduler.get_job(job_id).await.unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress.total_steps, 3);
        assert_eq!(job.progress.message, "Workflow queued for execution");
        assert_eq!(scheduler.stats().queue_depth, 1);
    }

    #[tokio::test]
    async fn test_cancel_pending_job_is_skipped_by_workers() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("people.csv"), people_csv()).unwrap();
        let (scheduler, _store) = scheduler(temp_dir.path(), 1, ScriptedEnrichment::new());

        let job_id = scheduler.submit(filter_workflow(), None).await.unwrap();
        assert!(scheduler.cancel(job_id).await.unwrap());

        scheduler.start();
        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.stats().queue_depth > 0 {
            assert!(Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Give the worker time to observe the refused transition
        tokio::time::sleep(Duration::from_millis(50)).await;

        let job = scheduler.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.results.is_empty());
        assert!(job.started_at.is_none());

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let temp_dir = TempDir::new().unwrap();
        let enrichment = ScriptedEnrichment::new().with_delay(Duration::from_secs(30));
        let (scheduler, _store) = scheduler(temp_dir.path(), 1, enrichment);
        scheduler.start();

        let input = json!([{"name": "Ada"}, {"name": "Lin"}]);
        let job_id = scheduler.submit(slow_enrich_workflow(), Some(input)).await.unwrap();
        wait_for(&scheduler, job_id, |j| j.status == JobStatus::Running && j.progress.current_step == 1).await;

        let started = Instant::now();
        assert!(scheduler.cancel(job_id).await.unwrap());
        assert!(started.elapsed() < Duration::from_secs(10));

        let job = scheduler.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.results.is_empty());
        assert_eq!(scheduler.stats().running_count, 0);

        // Idempotent once terminal
        assert!(!scheduler.cancel(job_id).await.unwrap());

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_running_job_keeps_earlier_results() {
        let temp_dir = TempDir::new().unwrap();
        let enrichment = ScriptedEnrichment::new().with_delay(Duration::from_secs(30));
        let (scheduler, _store) = scheduler(temp_dir.path(), 1, enrichment);
        scheduler.start();

        let workflow = Workflow::new("staged", "Staged")
            .with_block(Block::new("F", BlockKind::Filter, "Filter").with_param("condition", "age > 30"))
            .with_block(Block::new("E", BlockKind::EnrichRecord, "Enrich").with_param("struct", json!({"title": "Job title"})))
            .with_block(Block::new("S", BlockKind::SaveTable, "Save"))
            .connect("F", "E")
            .connect("E", "S");
        let input = json!([{"name": "Ada", "age": 36}, {"name": "Lin", "age": 29}]);
        let job_id = scheduler.submit(workflow, Some(input)).await.unwrap();
        wait_for(&scheduler, job_id, |j| j.status == JobStatus::Running && j.progress.current_step == 2).await;

        assert!(scheduler.cancel(job_id).await.unwrap());

        let job = scheduler.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        let ran: Vec<&str> = job.results.iter().map(|r| r.block_id.as_str()).collect();
        assert_eq!(ran, ["F"]);
        assert!(job.results[0].success);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_unknown_or_finished_job() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("people.csv"), people_csv()).unwrap();
        let (scheduler, _store) = scheduler(temp_dir.path(), 1, ScriptedEnrichment::new());
        scheduler.start();

        assert!(!scheduler.cancel(JobId::new()).await.unwrap());

        let job_id = scheduler.submit(filter_workflow(), None).await.unwrap();
        wait_for(&scheduler, job_id, |j| j.status.is_terminal()).await;
        assert!(!scheduler.cancel(job_id).await.unwrap());
        assert_eq!(
            scheduler.get_job(job_id).await.unwrap().status,
            JobStatus::Completed
        );

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_worker_survives_failed_job() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("people.csv"), people_csv()).unwrap();
        let (scheduler, _store) = scheduler(temp_dir.path(), 1, ScriptedEnrichment::new());
        scheduler.start();

        let broken = Workflow::new("broken", "Broken")
            .with_block(Block::new("A", BlockKind::LoadTable, "Load").with_param("file_path", "absent.csv"));
        let first = scheduler.submit(broken, None).await.unwrap();
        let second = scheduler.submit(filter_workflow(), None).await.unwrap();

        let failed = wait_for(&scheduler, first, |j| j.status.is_terminal()).await;
        let completed = wait_for(&scheduler, second, |j| j.status.is_terminal()).await;

        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(scheduler.stats().active_worker_count, 1);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_pool_size_bounds_running_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let enrichment = ScriptedEnrichment::new().with_delay(Duration::from_millis(200));
        let (scheduler, _store) = scheduler(temp_dir.path(), 2, enrichment);
        scheduler.start();

        for _ in 0..4 {
            let input = json!([{"name": "Ada"}]);
            scheduler.submit(slow_enrich_workflow(), Some(input)).await.unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let stats = scheduler.stats();
            assert!(stats.running_count <= 2);
            let jobs = scheduler.list_jobs(None, Some(JobStatus::Completed)).await.unwrap();
            if jobs.len() == 4 {
                break;
            }
            assert!(Instant::now() < deadline, "jobs did not finish");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stop_cancels_queued_jobs_and_refuses_new_work() {
        let temp_dir = TempDir::new().unwrap();
        let (scheduler, _store) = scheduler(temp_dir.path(), 1, ScriptedEnrichment::new());

        let first = scheduler.submit(filter_workflow(), None).await.unwrap();
        let second = scheduler.submit(filter_workflow(), None).await.unwrap();
        scheduler.stop().await;

        for job_id in [first, second] {
            let job = scheduler.get_job(job_id).await.unwrap();
            assert_eq!(job.status, JobStatus::Cancelled);
            assert_eq!(job.error_message.as_deref(), Some(SHUTDOWN_MESSAGE));
        }

        let stats = scheduler.stats();
        assert!(stats.is_shutting_down);
        assert_eq!(stats.queue_depth, 0);
        assert!(matches!(
            scheduler.submit(filter_workflow(), None).await,
            Err(EngineError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_stop_cancels_running_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let enrichment = ScriptedEnrichment::new().with_delay(Duration::from_secs(30));
        let (scheduler, _store) = scheduler(temp_dir.path(), 1, enrichment);
        scheduler.start();

        let input = json!([{"name": "Ada"}]);
        let job_id = scheduler.submit(slow_enrich_workflow(), Some(input)).await.unwrap();
        wait_for(&scheduler, job_id, |j| j.status == JobStatus::Running).await;

        scheduler.stop().await;

        let job = scheduler.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        let stats = scheduler.stats();
        assert_eq!(stats.running_count, 0);
        assert_eq!(stats.active_worker_count, 0);
    }

    #[tokio::test]
    async fn test_submit_by_id_and_list_jobs() {
        let temp_dir = TempDir::new().unwrap();
        let (scheduler, store) = scheduler(temp_dir.path(), 1, ScriptedEnrichment::new());
        WorkflowStore::save(store.as_ref(), &filter_workflow()).await.unwrap();

        let job_id = scheduler
            .submit_by_id(&WorkflowId::new("adults"), None)
            .await
            .unwrap();
        let missing = scheduler
            .submit_by_id(&WorkflowId::new("nope"), None)
            .await;
        assert!(matches!(missing, Err(EngineError::WorkflowNotFound(_))));

        let jobs = scheduler
            .list_jobs(Some(&WorkflowId::new("adults")), Some(JobStatus::Pending))
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job_id);
        assert!(scheduler
            .list_jobs(None, Some(JobStatus::Running))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            scheduler.get_job(JobId::new()).await,
            Err(EngineError::JobNotFound(_))
        ));
    }
}
