use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Parallel page fetches against the checking service.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Root under which each document gets its resolve output directory.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Seconds after which an unfinished pipeline run is considered
    /// abandoned and no longer blocks new runs.
    #[serde(default = "default_stale_run_secs")]
    pub stale_run_secs: u64,
}

fn default_worker_count() -> usize {
    num_cpus::get().clamp(4, 8)
}

fn default_stale_run_secs() -> u64 {
    60 * 60
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output_pdfs").join("pipelines")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            worker_count: default_worker_count(),
            retry: RetryConfig::default(),
            output_root: default_output_root(),
            database_path: None,
            stale_run_secs: default_stale_run_secs(),
        }
    }
}

impl Config {
    /// Output directory for one document's resolve artifacts.
    pub fn document_output_dir(&self, document_id: i64) -> PathBuf {
        self.output_root.join(document_id.to_string())
    }

    pub fn stale_run_after(&self) -> Duration {
        Duration::from_secs(self.stale_run_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}
