use crate::dataset::{cell_to_string, Dataset};
use anyhow::{bail, Context, Result};
use serde_json::{Number, Value};
use std::path::Path;

/// Options for reading a table file
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    /// Lines skipped before the header row
    pub skip_rows: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            skip_rows: 0,
        }
    }
}

/// Options for writing a table file
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub delimiter: u8,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Reads and writes datasets as files
#[async_trait::async_trait]
pub trait TableIo: Send + Sync {
    async fn load(&self, path: &Path, options: &LoadOptions) -> Result<Dataset>;

    /// Write the dataset, creating parent directories as needed
    async fn save(&self, dataset: &Dataset, path: &Path, options: &SaveOptions) -> Result<()>;
}

/// Delimited-text implementation with per-cell type inference
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableIo;

impl CsvTableIo {
    pub fn new() -> Self {
        Self
    }

    fn parse(content: &str, options: &LoadOptions) -> Result<Dataset> {
        let content = skip_lines(content, options.skip_rows);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .flexible(true)
            .from_reader(content.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .context("Failed to read header row")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if columns.is_empty() || columns.iter().all(String::is_empty) {
            bail!("Table has no columns");
        }

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed row {}", line + 1))?;
            rows.push(record.iter().map(infer_cell).collect());
        }

        Ok(Dataset::new(columns, rows))
    }

    fn render(dataset: &Dataset, options: &SaveOptions) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .from_writer(Vec::new());

        writer
            .write_record(dataset.columns())
            .context("Failed to write header row")?;
        for row in dataset.rows() {
            writer
                .write_record(row.iter().map(cell_to_string))
                .context("Failed to write row")?;
        }

        writer.into_inner().context("Failed to flush table")
    }
}

#[async_trait::async_trait]
impl TableIo for CsvTableIo {
    async fn load(&self, path: &Path, options: &LoadOptions) -> Result<Dataset> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let content = String::from_utf8(bytes)
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?;

        let dataset = Self::parse(&content, options)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        tracing::debug!(
            "Loaded {} rows x {} columns from {}",
            dataset.row_count(),
            dataset.columns().len(),
            path.display()
        );
        Ok(dataset)
    }

    async fn save(&self, dataset: &Dataset, path: &Path, options: &SaveOptions) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let bytes = Self::render(dataset, options)?;
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Saved {} rows to {}", dataset.row_count(), path.display());
        Ok(())
    }
}

fn skip_lines(content: &str, count: usize) -> &str {
    let mut rest = content;
    for _ in 0..count {
        match rest.find('\n') {
            Some(idx) => rest = &rest[idx + 1..],
            None => return "",
        }
    }
    rest
}

/// Empty → null, then boolean, integer, float, else text
fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    if let Some(n) = trimmed
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .and_then(Number::from_f64)
    {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}
