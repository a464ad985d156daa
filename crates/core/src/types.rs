use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a block, unique within its workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of processing a block performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    #[serde(alias = "read_csv")]
    LoadTable,
    #[serde(alias = "save_csv")]
    SaveTable,
    Filter,
    #[serde(alias = "enrich_lead")]
    EnrichRecord,
    #[serde(alias = "find_email")]
    FindContact,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockKind::LoadTable => "load_table",
            BlockKind::SaveTable => "save_table",
            BlockKind::Filter => "filter",
            BlockKind::EnrichRecord => "enrich_record",
            BlockKind::FindContact => "find_contact",
        };
        f.write_str(name)
    }
}

/// Canvas position of a block (editor metadata, ignored by the engine)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// One typed processing step of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub position: Position,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockKind, name: impl Into<String>) -> Self {
        Self {
            id: BlockId::new(id),
            kind,
            name: name.into(),
            description: None,
            parameters: Map::new(),
            position: Position::default(),
        }
    }

    /// Set a parameter, builder style
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Directed edge between two blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source_block_id: BlockId,
    pub target_block_id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_block_id: BlockId::new(source),
            target_block_id: BlockId::new(target),
            connection_id: None,
        }
    }
}

/// A pipeline definition: blocks plus the connections between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(id),
            name: name.into(),
            description: None,
            blocks: Vec::new(),
            connections: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn connect(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.connections.push(Connection::new(source, target));
        self
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }
}

/// Status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Legal edges of the job state machine
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Progress snapshot of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current_step: usize,
    pub total_steps: usize,
    pub current_block_id: Option<BlockId>,
    pub current_block_name: Option<String>,
    pub processed_rows: usize,
    pub total_rows: usize,
    pub message: String,
    pub percentage: f64,
}

impl JobProgress {
    pub fn queued(total_steps: usize) -> Self {
        Self {
            total_steps,
            message: "Workflow queued for execution".to_string(),
            ..Default::default()
        }
    }

    /// Progress emitted right before the block at `step` (0-based) runs.
    ///
    /// The percentage counts only fully executed blocks, so it reaches 100
    /// solely through [`JobProgress::completed`].
    pub fn before_block(step: usize, total_steps: usize, block: &Block) -> Self {
        let percentage = if total_steps == 0 {
            0.0
        } else {
            step as f64 / total_steps as f64 * 100.0
        };
        Self {
            current_step: step + 1,
            total_steps,
            current_block_id: Some(block.id.clone()),
            current_block_name: Some(block.name.clone()),
            processed_rows: 0,
            total_rows: 0,
            message: format!("Executing {}", block.name),
            percentage,
        }
    }

    pub fn completed(total_steps: usize) -> Self {
        Self {
            current_step: total_steps,
            total_steps,
            message: "Workflow completed successfully".to_string(),
            percentage: 100.0,
            ..Default::default()
        }
    }

    /// Same position, new message
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..self.clone()
        }
    }
}

/// Outcome record of one executed block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub block_id: BlockId,
    pub block_kind: BlockKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_seconds: f64,
    pub rows_processed: usize,
    pub rows_output: usize,
}

impl JobResult {
    pub fn success(
        block: &Block,
        data: Map<String, Value>,
        execution_time_seconds: f64,
        rows_processed: usize,
        rows_output: usize,
    ) -> Self {
        Self {
            block_id: block.id.clone(),
            block_kind: block.kind,
            success: true,
            data: Some(data),
            error: None,
            execution_time_seconds,
            rows_processed,
            rows_output,
        }
    }

    pub fn failure(block: &Block, error: impl Into<String>, execution_time_seconds: f64) -> Self {
        Self {
            block_id: block.id.clone(),
            block_kind: block.kind,
            success: false,
            data: None,
            error: Some(error.into()),
            execution_time_seconds,
            rows_processed: 0,
            rows_output: 0,
        }
    }
}

/// One execution instance of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub workflow_id: WorkflowId,
    pub status: JobStatus,
    pub progress: JobProgress,
    #[serde(default)]
    pub results: Vec<JobResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub final_output_location: Option<String>,
}

impl Job {
    pub fn new(workflow_id: WorkflowId, total_steps: usize) -> Self {
        Self {
            id: JobId::new(),
            workflow_id,
            status: JobStatus::Pending,
            progress: JobProgress::queued(total_steps),
            results: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            final_output_location: None,
        }
    }

    /// Move to `next` if the state machine allows it, stamping timestamps.
    /// Returns false and leaves the job untouched otherwise.
    pub fn transition(&mut self, next: JobStatus, error: Option<String>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }

        self.status = next;
        if error.is_some() {
            self.error_message = error;
        }

        let now = Utc::now();
        match next {
            JobStatus::Running => self.started_at = Some(now),
            s if s.is_terminal() => self.completed_at = Some(now),
            _ => {}
        }

        true
    }
}

/// Aggregate view of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub running_count: usize,
    pub queue_depth: usize,
    pub pool_size: usize,
    pub active_worker_count: usize,
    pub is_shutting_down: bool,
}
