// Core engine for Blockflow: workflow planning, block execution and job scheduling

pub mod config;
pub mod dataset;
pub mod enrichment;
pub mod error;
pub mod filter;
pub mod scheduler;
pub mod storage;
pub mod table_io;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{EngineError, EngineResult};
pub use types::*;
