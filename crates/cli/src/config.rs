use anyhow::{Context, Result};
use blockflow_core::config::{EngineConfig, EnrichmentConfig};
use blockflow_core::enrichment::HttpEnrichmentClient;
use blockflow_core::scheduler::JobScheduler;
use blockflow_core::storage::{InMemoryStore, JobStore, RedbStore, WorkflowStore};
use blockflow_core::table_io::CsvTableIo;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const API_KEY_ENV: &str = "BLOCKFLOW_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_index_file")]
    pub index_file: String,
}

fn default_index_file() -> String {
    "jobs.redb".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            index_file: default_index_file(),
        }
    }
}

impl RunnerConfig {
    pub fn load(config_path: &Path, data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        // Load config file if it exists, otherwise use defaults
        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;
            toml::from_str(&content).context("Failed to parse configuration file")?
        } else {
            tracing::info!("Configuration file not found, using defaults");
            Self::default()
        };

        config.data_dir = data_dir;
        if let Ok(api_key) = std::env::var(API_KEY_ENV) {
            if !api_key.is_empty() {
                config.enrichment.api_key = Some(api_key);
            }
        }

        Ok(config)
    }

    /// Get the redb file path
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.index_file)
    }
}

/// Engine components wired from a [`RunnerConfig`]
pub struct AppState {
    pub job_store: Arc<dyn JobStore>,
    pub workflow_store: Arc<dyn WorkflowStore>,
    pub scheduler: Arc<JobScheduler>,
}

impl AppState {
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        let job_store: Arc<dyn JobStore>;
        let workflow_store: Arc<dyn WorkflowStore>;
        match config.storage.backend {
            StorageBackend::Memory => {
                let store = Arc::new(InMemoryStore::new());
                job_store = store.clone();
                workflow_store = store;
            }
            StorageBackend::Redb => {
                let store = Arc::new(
                    RedbStore::new(config.index_path()).context("Failed to create job store")?,
                );
                job_store = store.clone();
                workflow_store = store;
            }
        }

        let enrichment = Arc::new(
            HttpEnrichmentClient::new(&config.enrichment)
                .context("Failed to create enrichment client")?,
        );

        let scheduler = Arc::new(JobScheduler::new(
            &config.engine,
            job_store.clone(),
            workflow_store.clone(),
            Arc::new(CsvTableIo::new()),
            enrichment,
        ));

        Ok(Self {
            job_store,
            workflow_store,
            scheduler,
        })
    }
}
