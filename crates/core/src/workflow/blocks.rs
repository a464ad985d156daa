//! Validated parameters for each block kind.

use crate::error::{EngineError, EngineResult};
use crate::filter::Predicate;
use crate::types::{Block, BlockKind};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadTableParams {
    pub file_path: String,
    pub delimiter: u8,
    pub skip_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveTableParams {
    /// None means a generated, timestamped file name
    pub file_path: Option<String>,
    pub delimiter: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichRecordParams {
    pub schema: Map<String, Value>,
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindContactParams {
    pub batch_size: usize,
}

/// A block's parameters, parsed for its kind
#[derive(Debug, Clone, PartialEq)]
pub enum BlockSpec {
    LoadTable(LoadTableParams),
    SaveTable(SaveTableParams),
    Filter(FilterParams),
    EnrichRecord(EnrichRecordParams),
    FindContact(FindContactParams),
}

#[derive(Deserialize)]
struct RawLoadTable {
    #[serde(default)]
    file_path: String,
    #[serde(default = "default_delimiter")]
    delimiter: String,
    #[serde(default = "default_encoding")]
    encoding: String,
    #[serde(default)]
    skip_rows: usize,
}

#[derive(Deserialize)]
struct RawSaveTable {
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default = "default_delimiter")]
    delimiter: String,
}

#[derive(Deserialize)]
struct RawFilter {
    #[serde(default)]
    condition: String,
}

#[derive(Deserialize)]
struct RawEnrichRecord {
    #[serde(default, rename = "struct")]
    schema: Map<String, Value>,
    #[serde(default)]
    batch_size: Option<usize>,
}

#[derive(Deserialize)]
struct RawFindContact {
    #[serde(default)]
    batch_size: Option<usize>,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl BlockSpec {
    /// Parse and validate `block.parameters` for `block.kind`
    pub fn from_block(block: &Block, default_batch_size: usize) -> EngineResult<Self> {
        match block.kind {
            BlockKind::LoadTable => {
                let raw: RawLoadTable = parse(block)?;
                if raw.file_path.trim().is_empty() {
                    return Err(config_error("file_path is required"));
                }
                if !matches!(raw.encoding.to_ascii_lowercase().as_str(), "utf-8" | "utf8") {
                    return Err(config_error(format!(
                        "unsupported encoding '{}' (only utf-8 is supported)",
                        raw.encoding
                    )));
                }
                Ok(BlockSpec::LoadTable(LoadTableParams {
                    file_path: raw.file_path,
                    delimiter: delimiter_byte(&raw.delimiter)?,
                    skip_rows: raw.skip_rows,
                }))
            }
            BlockKind::SaveTable => {
                let raw: RawSaveTable = parse(block)?;
                Ok(BlockSpec::SaveTable(SaveTableParams {
                    file_path: raw.file_path.filter(|p| !p.trim().is_empty()),
                    delimiter: delimiter_byte(&raw.delimiter)?,
                }))
            }
            BlockKind::Filter => {
                let raw: RawFilter = parse(block)?;
                if raw.condition.trim().is_empty() {
                    return Err(config_error("condition is required"));
                }
                Ok(BlockSpec::Filter(FilterParams {
                    predicate: Predicate::parse(&raw.condition)?,
                }))
            }
            BlockKind::EnrichRecord => {
                let raw: RawEnrichRecord = parse(block)?;
                if raw.schema.is_empty() {
                    return Err(config_error(
                        "struct is required and must name at least one field",
                    ));
                }
                Ok(BlockSpec::EnrichRecord(EnrichRecordParams {
                    schema: raw.schema,
                    batch_size: batch_size(raw.batch_size, default_batch_size)?,
                }))
            }
            BlockKind::FindContact => {
                let raw: RawFindContact = parse(block)?;
                Ok(BlockSpec::FindContact(FindContactParams {
                    batch_size: batch_size(raw.batch_size, default_batch_size)?,
                }))
            }
        }
    }
}

fn parse<T: DeserializeOwned>(block: &Block) -> EngineResult<T> {
    serde_json::from_value(Value::Object(block.parameters.clone()))
        .map_err(|e| config_error(format!("{} block '{}': {}", block.kind, block.id, e)))
}

fn config_error(message: impl Into<String>) -> EngineError {
    EngineError::BlockConfig(message.into())
}

fn delimiter_byte(delimiter: &str) -> EngineResult<u8> {
    match delimiter.as_bytes() {
        [byte] => Ok(*byte),
        _ if delimiter == "\\t" => Ok(b'\t'),
        _ => Err(config_error(format!(
            "delimiter must be a single ASCII character, got '{}'",
            delimiter
        ))),
    }
}

fn batch_size(requested: Option<usize>, default: usize) -> EngineResult<usize> {
    match requested.unwrap_or(default) {
        0 => Err(config_error("batch_size must be at least 1")),
        size => Ok(size),
    }
}
