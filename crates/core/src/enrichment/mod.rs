pub mod batch;
pub mod http;

pub use batch::{BatchCaller, BatchOutcome};
pub use http::HttpEnrichmentClient;

use crate::dataset::Record;
use anyhow::Result;
use serde_json::{Map, Value};

/// External service that augments or completes individual records
#[async_trait::async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Return the fields described by `schema` for one record
    async fn enrich_record(&self, record: &Record, schema: &Map<String, Value>) -> Result<Record>;

    /// Look up contact details for one record
    async fn find_contact(&self, record: &Record) -> Result<Record>;
}
