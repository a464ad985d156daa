//! Tabular datasets and the per-job keyed store that hands them between blocks.

use crate::types::BlockId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Key of the implicit dataset a job starts from
pub const MAIN_DATASET_KEY: &str = "main";

/// A flat record: column name to cell value
pub type Record = Map<String, Value>;

/// Store key of the dataset a block produces
pub fn output_key(block_id: &BlockId) -> String {
    format!("{}_output", block_id)
}

/// Ordered rows under a fixed set of named columns.
///
/// Every row has exactly one cell per column; missing cells are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset, padding short rows with nulls and truncating long ones.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build from records; columns appear in first-seen order.
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for record in records {
            for key in record.keys() {
                if !positions.contains_key(key) {
                    positions.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut row = vec![Value::Null; columns.len()];
                for (key, value) in record {
                    if let Some(&idx) = positions.get(key) {
                        row[idx] = value.clone();
                    }
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Keep the rows whose mask entry is true
    pub fn select_rows(&self, mask: &[bool]) -> Dataset {
        let rows = self
            .rows
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(row, _)| row.clone())
            .collect();
        Dataset {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Rows as flat string records; null cells are left out.
    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .filter(|(_, cell)| !cell.is_null())
                    .map(|(column, cell)| (column.clone(), Value::String(cell_to_string(cell))))
                    .collect()
            })
            .collect()
    }
}

/// Text form of a cell as written to files and sent to services
pub fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
struct DatasetEntry {
    dataset: Dataset,
    metadata: Map<String, Value>,
}

/// Keyed datasets of one running job
#[derive(Debug, Default)]
pub struct DatasetStore {
    entries: HashMap<String, DatasetEntry>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the dataset under `key`
    pub fn store(&mut self, key: impl Into<String>, dataset: Dataset, metadata: Map<String, Value>) {
        self.entries
            .insert(key.into(), DatasetEntry { dataset, metadata });
    }

    pub fn get(&self, key: &str) -> Option<&Dataset> {
        self.entries.get(key).map(|e| &e.dataset)
    }

    pub fn metadata(&self, key: &str) -> Option<&Map<String, Value>> {
        self.entries.get(key).map(|e| &e.metadata)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

}
