use super::blocks::{
    BlockSpec, EnrichRecordParams, FilterParams, FindContactParams, LoadTableParams,
    SaveTableParams,
};
use crate::dataset::{output_key, Dataset, DatasetStore, Record};
use crate::enrichment::{BatchCaller, BatchOutcome, EnrichmentService};
use crate::error::{EngineError, EngineResult};
use crate::table_io::{LoadOptions, SaveOptions, TableIo};
use crate::types::{Block, JobResult};
use chrono::Local;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Receives row-level progress from long-running blocks
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn rows_processed(&self, block: &Block, processed: usize, total: usize);
}

/// What a block needs from the job running it
pub struct BlockContext<'a> {
    pub datasets: &'a mut DatasetStore,
    pub progress: &'a dyn ProgressSink,
    pub cancel: &'a CancellationToken,
}

/// Outcome of executing one block
#[derive(Debug, Clone)]
pub enum BlockOutcome {
    /// The block ran; `output_key` is set only on success
    Finished {
        result: JobResult,
        output_key: Option<String>,
    },
    /// Cancellation was observed before the block could finish
    Cancelled,
}

struct BlockOutput {
    output_key: String,
    data: Map<String, Value>,
    rows_processed: usize,
    rows_output: usize,
}

/// Per-record service call made by the enrichment-style blocks
enum ServiceCall<'a> {
    EnrichRecord { schema: &'a Map<String, Value> },
    FindContact,
}

impl ServiceCall<'_> {
    fn status_column(&self) -> &'static str {
        match self {
            ServiceCall::EnrichRecord { .. } => "_enrichment_status",
            ServiceCall::FindContact => "_contact_status",
        }
    }

    fn error_column(&self) -> &'static str {
        match self {
            ServiceCall::EnrichRecord { .. } => "_enrichment_error",
            ServiceCall::FindContact => "_contact_error",
        }
    }
}

/// Executes individual blocks against a job's datasets
pub struct BlockExecutor {
    table_io: Arc<dyn TableIo>,
    enrichment: Arc<dyn EnrichmentService>,
    upload_dir: PathBuf,
    default_batch_size: usize,
}

impl BlockExecutor {
    pub fn new(
        table_io: Arc<dyn TableIo>,
        enrichment: Arc<dyn EnrichmentService>,
        upload_dir: PathBuf,
        default_batch_size: usize,
    ) -> Self {
        Self {
            table_io,
            enrichment,
            upload_dir,
            default_batch_size,
        }
    }

    /// Execute a block reading the dataset under `input_key`.
    ///
    /// Failures are folded into an unsuccessful [`JobResult`]; only
    /// cancellation is reported separately.
    pub async fn execute(&self, block: &Block, input_key: &str, ctx: BlockContext<'_>) -> BlockOutcome {
        tracing::info!(
            "Executing block {} ({}) with input '{}'",
            block.id,
            block.kind,
            input_key
        );
        let start = Instant::now();

        let result = match BlockSpec::from_block(block, self.default_batch_size) {
            Ok(spec) => self.dispatch(block, spec, input_key, ctx).await,
            Err(e) => Err(e),
        };

        let elapsed = start.elapsed().as_secs_f64();
        match result {
            Ok(output) => {
                tracing::info!(
                    "Block {} completed in {:.3}s: {} rows in, {} rows out",
                    block.id,
                    elapsed,
                    output.rows_processed,
                    output.rows_output
                );
                BlockOutcome::Finished {
                    result: JobResult::success(
                        block,
                        output.data,
                        elapsed,
                        output.rows_processed,
                        output.rows_output,
                    ),
                    output_key: Some(output.output_key),
                }
            }
            Err(EngineError::Cancelled) => {
                tracing::info!("Block {} cancelled after {:.3}s", block.id, elapsed);
                BlockOutcome::Cancelled
            }
            Err(e) => {
                tracing::error!("Block {} failed: {}", block.id, e);
                BlockOutcome::Finished {
                    result: JobResult::failure(block, e.to_string(), elapsed),
                    output_key: None,
                }
            }
        }
    }

    async fn dispatch(
        &self,
        block: &Block,
        spec: BlockSpec,
        input_key: &str,
        ctx: BlockContext<'_>,
    ) -> EngineResult<BlockOutput> {
        match spec {
            BlockSpec::LoadTable(params) => self.load_table(block, &params, ctx).await,
            BlockSpec::SaveTable(params) => self.save_table(block, &params, input_key, ctx).await,
            BlockSpec::Filter(params) => filter(block, &params, input_key, ctx),
            BlockSpec::EnrichRecord(EnrichRecordParams { schema, batch_size }) => {
                self.call_service(block, ServiceCall::EnrichRecord { schema: &schema }, batch_size, input_key, ctx)
                    .await
            }
            BlockSpec::FindContact(FindContactParams { batch_size }) => {
                self.call_service(block, ServiceCall::FindContact, batch_size, input_key, ctx)
                    .await
            }
        }
    }

    /// Relative paths resolve against the upload directory
    fn resolve_path(&self, raw: &str) -> PathBuf {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
        let path = Path::new(trimmed);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.upload_dir.join(path)
        }
    }

    async fn load_table(
        &self,
        block: &Block,
        params: &LoadTableParams,
        ctx: BlockContext<'_>,
    ) -> EngineResult<BlockOutput> {
        let path = self.resolve_path(&params.file_path);
        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if !exists {
            return Err(EngineError::FileNotFound(path.display().to_string()));
        }

        let options = LoadOptions {
            delimiter: params.delimiter,
            skip_rows: params.skip_rows,
        };
        let dataset = self
            .table_io
            .load(&path, &options)
            .await
            .map_err(|e| EngineError::BlockExecution(format!("{:#}", e)))?;

        let key = output_key(&block.id);
        let rows = dataset.row_count();
        let columns = dataset.columns().to_vec();
        let file_path = path.display().to_string();

        let mut metadata = Map::new();
        metadata.insert("source_file".to_string(), json!(file_path));
        metadata.insert("block_id".to_string(), json!(block.id));
        ctx.datasets.store(key.clone(), dataset, metadata);

        Ok(BlockOutput {
            data: object(json!({
                "output_key": key,
                "rows_loaded": rows,
                "columns": columns,
                "file_path": file_path,
            })),
            output_key: key,
            rows_processed: 0,
            rows_output: rows,
        })
    }

    async fn save_table(
        &self,
        block: &Block,
        params: &SaveTableParams,
        input_key: &str,
        ctx: BlockContext<'_>,
    ) -> EngineResult<BlockOutput> {
        let dataset = input(ctx.datasets, input_key)?;

        let file_name = params.file_path.clone().unwrap_or_else(|| {
            format!(
                "output_{}_{}.csv",
                block.id,
                Local::now().format("%Y%m%d_%H%M%S")
            )
        });
        let path = self.resolve_path(&file_name);

        let options = SaveOptions {
            delimiter: params.delimiter,
        };
        self.table_io
            .save(dataset, &path, &options)
            .await
            .map_err(|e| EngineError::BlockExecution(format!("{:#}", e)))?;

        let rows = dataset.row_count();
        Ok(BlockOutput {
            data: object(json!({
                "output_key": input_key,
                "file_path": path.display().to_string(),
                "rows_saved": rows,
            })),
            output_key: input_key.to_string(),
            rows_processed: rows,
            rows_output: rows,
        })
    }

    async fn call_service(
        &self,
        block: &Block,
        call: ServiceCall<'_>,
        batch_size: usize,
        input_key: &str,
        ctx: BlockContext<'_>,
    ) -> EngineResult<BlockOutput> {
        let records = input(ctx.datasets, input_key)?.to_records();
        let total = records.len();
        let caller = BatchCaller::new(batch_size);

        let mut merged: Vec<Record> = Vec::with_capacity(total);
        let mut succeeded = 0;

        for chunk in records.chunks(batch_size) {
            if ctx.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let outcomes = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(EngineError::Cancelled),
                outcomes = caller.call_batch(chunk.to_vec(), |record| self.call_one(&call, record)) => outcomes,
            };

            for (original, outcome) in chunk.iter().zip(outcomes) {
                let mut record = original.clone();
                match outcome {
                    BatchOutcome::Success(response) => {
                        succeeded += 1;
                        record.extend(response);
                        record.insert(call.status_column().to_string(), json!("success"));
                    }
                    BatchOutcome::Failure { error, .. } => {
                        tracing::warn!("Block {}: record {} failed: {}", block.id, merged.len(), error);
                        record.insert(call.error_column().to_string(), json!(error));
                        record.insert(call.status_column().to_string(), json!("failed"));
                    }
                }
                merged.push(record);
            }

            ctx.progress
                .rows_processed(block, merged.len().min(total), total)
                .await;
        }

        let failed = total - succeeded;
        let key = output_key(&block.id);
        let enriched = Dataset::from_records(&merged);
        let rows_output = enriched.row_count();

        let mut metadata = Map::new();
        metadata.insert("block_id".to_string(), json!(block.id));
        metadata.insert("source_key".to_string(), json!(input_key));
        ctx.datasets.store(key.clone(), enriched, metadata);

        let data = match call {
            ServiceCall::EnrichRecord { schema } => json!({
                "output_key": key,
                "original_rows": total,
                "enriched_rows": rows_output,
                "successful_enrichments": succeeded,
                "failed_enrichments": failed,
                "struct_fields": schema.keys().collect::<Vec<_>>(),
            }),
            ServiceCall::FindContact => json!({
                "output_key": key,
                "original_rows": total,
                "enriched_rows": rows_output,
                "successful_finds": succeeded,
                "failed_finds": failed,
            }),
        };

        Ok(BlockOutput {
            data: object(data),
            output_key: key,
            rows_processed: total,
            rows_output,
        })
    }

    async fn call_one(&self, call: &ServiceCall<'_>, record: Record) -> anyhow::Result<Record> {
        match call {
            ServiceCall::EnrichRecord { schema } => {
                self.enrichment.enrich_record(&record, schema).await
            }
            ServiceCall::FindContact => self.enrichment.find_contact(&record).await,
        }
    }
}

fn filter(
    block: &Block,
    params: &FilterParams,
    input_key: &str,
    ctx: BlockContext<'_>,
) -> EngineResult<BlockOutput> {
    let dataset = input(ctx.datasets, input_key)?;
    let mask = params.predicate.evaluate(dataset)?;
    let filtered = dataset.select_rows(&mask);

    let original_rows = dataset.row_count();
    let filtered_rows = filtered.row_count();
    let key = output_key(&block.id);

    let mut metadata = Map::new();
    metadata.insert("block_id".to_string(), json!(block.id));
    metadata.insert("source_key".to_string(), json!(input_key));
    ctx.datasets.store(key.clone(), filtered, metadata);

    Ok(BlockOutput {
        data: object(json!({
            "output_key": key,
            "original_rows": original_rows,
            "filtered_rows": filtered_rows,
            "condition": params.predicate.source(),
        })),
        output_key: key,
        rows_processed: original_rows,
        rows_output: filtered_rows,
    })
}

fn input<'a>(datasets: &'a DatasetStore, key: &str) -> EngineResult<&'a Dataset> {
    datasets
        .get(key)
        .ok_or_else(|| EngineError::BlockExecution(format!("No dataset found with key: {}", key)))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table_io::CsvTableIo;
    use crate::testing::{people_csv, NoProgress, ScriptedEnrichment};
    use crate::types::BlockKind;
    use tempfile::TempDir;

    fn executor(upload_dir: &Path, enrichment: ScriptedEnrichment) -> BlockExecutor {
        BlockExecutor::new(
            Arc::new(CsvTableIo::new()),
            Arc::new(enrichment),
            upload_dir.to_path_buf(),
            10,
        )
    }

    async fn run(
        executor: &BlockExecutor,
        block: &Block,
        input_key: &str,
        datasets: &mut DatasetStore,
    ) -> BlockOutcome {
        let cancel = CancellationToken::new();
        let ctx = BlockContext {
            datasets,
            progress: &NoProgress,
            cancel: &cancel,
        };
        executor.execute(block, input_key, ctx).await
    }

    fn finished(outcome: BlockOutcome) -> (JobResult, Option<String>) {
        match outcome {
            BlockOutcome::Finished { result, output_key } => (result, output_key),
            BlockOutcome::Cancelled => panic!("block was cancelled"),
        }
    }

    #[tokio::test]
    async fn test_load_table_resolves_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("people.csv"), people_csv()).unwrap();
        let executor = executor(temp_dir.path(), ScriptedEnrichment::new());

        let block = Block::new("load", BlockKind::LoadTable, "Load").with_param("file_path", "./people.csv");
        let mut datasets = DatasetStore::new();
        let (result, key) = finished(run(&executor, &block, "main", &mut datasets).await);

        assert!(result.success);
        assert_eq!(key.as_deref(), Some("load_output"));
        assert_eq!(result.rows_processed, 0);
        assert_eq!(result.rows_output, 10);
        assert_eq!(datasets.get("load_output").unwrap().row_count(), 10);
        assert_eq!(result.data.unwrap()["rows_loaded"], json!(10));
    }

    #[tokio::test]
    async fn test_load_table_missing_file_is_a_failed_result() {
        let temp_dir = TempDir::new().unwrap();
        let executor = executor(temp_dir.path(), ScriptedEnrichment::new());

        let block = Block::new("load", BlockKind::LoadTable, "Load").with_param("file_path", "nope.csv");
        let (result, key) = finished(run(&executor, &block, "main", &mut DatasetStore::new()).await);

        assert!(!result.success);
        assert!(key.is_none());
        assert!(result.error.unwrap().starts_with("File not found"));
    }

    #[tokio::test]
    async fn test_filter_on_missing_input_fails() {
        let temp_dir = TempDir::new().unwrap();
        let executor = executor(temp_dir.path(), ScriptedEnrichment::new());

        let block = Block::new("f", BlockKind::Filter, "Filter").with_param("condition", "age > 30");
        let (result, _) = finished(run(&executor, &block, "main", &mut DatasetStore::new()).await);

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No dataset found with key: main"));
    }

    #[tokio::test]
    async fn test_save_table_passes_the_key_through() {
        let temp_dir = TempDir::new().unwrap();
        let executor = executor(temp_dir.path(), ScriptedEnrichment::new());

        let mut datasets = DatasetStore::new();
        let dataset = Dataset::new(vec!["name".into()], vec![vec![json!("Ada")]]);
        datasets.store("load_output", dataset, Map::new());

        let block = Block::new("save", BlockKind::SaveTable, "Save");
        let (result, key) = finished(run(&executor, &block, "load_output", &mut datasets).await);

        assert!(result.success);
        assert_eq!(key.as_deref(), Some("load_output"));
        let data = result.data.unwrap();
        let path = PathBuf::from(data["file_path"].as_str().unwrap());
        assert!(path.starts_with(temp_dir.path()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("output_save_"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_enrich_after_load_keeps_column_order() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("people.csv"), people_csv()).unwrap();
        let enrichment = Arc::new(ScriptedEnrichment::new().failing_for("Lin"));
        let executor = BlockExecutor::new(
            Arc::new(CsvTableIo::new()),
            enrichment.clone(),
            temp_dir.path().to_path_buf(),
            10,
        );

        let mut datasets = DatasetStore::new();
        let load = Block::new("load", BlockKind::LoadTable, "Load").with_param("file_path", "people.csv");
        let (_, load_key) = finished(run(&executor, &load, "main", &mut datasets).await);

        let enrich = Block::new("enrich", BlockKind::EnrichRecord, "Enrich")
            .with_param("struct", json!({"title": "Job title", "city": "City"}))
            .with_param("batch_size", 3);
        let (result, key) = finished(run(&executor, &enrich, &load_key.unwrap(), &mut datasets).await);

        assert!(result.success);
        assert_eq!(enrichment.calls(), 10);
        let output = datasets.get(&key.unwrap()).unwrap();
        assert_eq!(
            output.columns(),
            [
                "name",
                "age",
                "company",
                "title",
                "city",
                "_enrichment_status",
                "_enrichment_error"
            ]
        );
        let records = output.to_records();
        assert_eq!(
            records[0].keys().collect::<Vec<_>>(),
            ["name", "age", "company", "title", "city", "_enrichment_status"]
        );
        assert_eq!(
            records[1].keys().collect::<Vec<_>>(),
            ["name", "age", "company", "_enrichment_status", "_enrichment_error"]
        );
    }

    #[tokio::test]
    async fn test_find_contact_marks_failures() {
        let temp_dir = TempDir::new().unwrap();
        let enrichment = ScriptedEnrichment::new().failing_for("Lin");
        let executor = executor(temp_dir.path(), enrichment);

        let mut datasets = DatasetStore::new();
        let dataset = Dataset::new(
            vec!["name".into()],
            vec![vec![json!("Ada")], vec![json!("Lin")]],
        );
        datasets.store("main", dataset, Map::new());

        let block = Block::new("fc", BlockKind::FindContact, "Find");
        let (result, key) = finished(run(&executor, &block, "main", &mut datasets).await);

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["successful_finds"], json!(1));
        assert_eq!(data["failed_finds"], json!(1));

        let output = datasets.get(&key.unwrap()).unwrap().to_records();
        assert_eq!(output[0]["_contact_status"], json!("success"));
        assert_eq!(output[0]["email"], json!("ada@example.com"));
        assert_eq!(output[1]["_contact_status"], json!("failed"));
        assert!(output[1].contains_key("_contact_error"));
    }

    #[tokio::test]
    async fn test_cancelled_enrichment_reports_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let executor = executor(temp_dir.path(), ScriptedEnrichment::new());

        let mut datasets = DatasetStore::new();
        datasets.store(
            "main",
            Dataset::new(vec!["name".into()], vec![vec![json!("Ada")]]),
            Map::new(),
        );

        let block = Block::new("e", BlockKind::EnrichRecord, "Enrich")
            .with_param("struct", json!({"title": "Job title"}));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = BlockContext {
            datasets: &mut datasets,
            progress: &NoProgress,
            cancel: &cancel,
        };

        assert!(matches!(
            executor.execute(&block, "main", ctx).await,
            BlockOutcome::Cancelled
        ));
        assert!(!datasets.contains("e_output"));
    }
}
