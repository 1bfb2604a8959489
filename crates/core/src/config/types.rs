use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{ActivityOptions, RetryPolicy};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub catalogue: CatalogueConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Logging configuration. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// External download utility configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    /// Path to the get_iplayer binary.
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Root directory; each run writes to `<output_dir>/<workflow_id>`.
    pub output_dir: PathBuf,
    /// Interval between liveness heartbeats while the utility runs.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Appended after the fixed flag set.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl DownloaderConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: default_program(),
            output_dir: output_dir.into(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            extra_args: Vec::new(),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

fn default_program() -> PathBuf {
    PathBuf::from("get_iplayer")
}

fn default_heartbeat_interval() -> u64 {
    120
}

/// Programme catalogue API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogueConfig {
    #[serde(default = "default_catalogue_url")]
    pub base_url: String,
    #[serde(default = "default_catalogue_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalogue_url(),
            timeout_secs: default_catalogue_timeout(),
        }
    }
}

fn default_catalogue_url() -> String {
    "https://www.bbc.co.uk".to_string()
}

fn default_catalogue_timeout() -> u64 {
    5
}

/// Object store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
    pub bucket: String,
}

fn default_store_root() -> PathBuf {
    PathBuf::from("objects")
}

/// Message bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    1024
}

/// Activity timeouts and the retry policy shared by every activity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Ceiling for the metadata and upload activities.
    #[serde(default = "default_activity_timeout")]
    pub activity_timeout_secs: u64,
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// How long a finished run stays queryable.
    #[serde(default = "default_run_retention")]
    pub run_retention_secs: u64,
    /// Upper bound on finished runs kept; the oldest are evicted first.
    #[serde(default = "default_max_finished_runs")]
    pub max_finished_runs: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            activity_timeout_secs: default_activity_timeout(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            retry: RetryConfig::default(),
            run_retention_secs: default_run_retention(),
            max_finished_runs: default_max_finished_runs(),
        }
    }
}

impl WorkflowConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    /// Options for the fetch activity, supervised by heartbeats.
    pub fn fetch_options(&self) -> ActivityOptions {
        ActivityOptions::new(Duration::from_secs(self.fetch_timeout_secs))
            .with_heartbeat_timeout(Duration::from_secs(self.heartbeat_timeout_secs))
            .with_retry_policy(self.retry_policy())
    }

    /// Options for the metadata and publish activities.
    pub fn activity_options(&self) -> ActivityOptions {
        ActivityOptions::new(Duration::from_secs(self.activity_timeout_secs))
            .with_retry_policy(self.retry_policy())
    }
}

fn default_fetch_timeout() -> u64 {
    3600 // 1 hour
}

fn default_activity_timeout() -> u64 {
    7200 // 2 hours
}

fn default_heartbeat_timeout() -> u64 {
    300 // 5 minutes
}

fn default_run_retention() -> u64 {
    86400 // 1 day
}

fn default_max_finished_runs() -> usize {
    1000
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: f64,
    #[serde(default = "default_maximum_interval")]
    pub maximum_interval_ms: u64,
    /// 0 means unlimited.
    #[serde(default = "default_maximum_attempts")]
    pub maximum_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval(),
            backoff_coefficient: default_backoff_coefficient(),
            maximum_interval_ms: default_maximum_interval(),
            maximum_attempts: default_maximum_attempts(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            backoff_coefficient: config.backoff_coefficient,
            maximum_interval: Duration::from_millis(config.maximum_interval_ms),
            maximum_attempts: config.maximum_attempts,
        }
    }
}

fn default_initial_interval() -> u64 {
    1000
}

fn default_backoff_coefficient() -> f64 {
    2.0
}

fn default_maximum_interval() -> u64 {
    300_000 // 5 minutes
}

fn default_maximum_attempts() -> u32 {
    3
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub downloader: SanitizedDownloaderConfig,
    pub catalogue: CatalogueConfig,
    pub store: SanitizedStoreConfig,
    pub workflow: WorkflowConfig,
}

/// Downloader config without local filesystem paths
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloaderConfig {
    pub program: String,
    pub heartbeat_interval_secs: u64,
    pub extra_args_count: usize,
}

/// Store config without the local root path
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStoreConfig {
    pub bucket: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            logging: config.logging.clone(),
            downloader: SanitizedDownloaderConfig {
                program: config
                    .downloader
                    .program
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                heartbeat_interval_secs: config.downloader.heartbeat_interval_secs,
                extra_args_count: config.downloader.extra_args.len(),
            },
            catalogue: config.catalogue.clone(),
            store: SanitizedStoreConfig {
                bucket: config.store.bucket.clone(),
            },
            workflow: config.workflow.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_into_policy() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.initial_interval, Duration::from_secs(1));
        assert_eq!(policy.backoff_coefficient, 2.0);
        assert_eq!(policy.maximum_interval, Duration::from_secs(300));
        assert_eq!(policy.maximum_attempts, 3);
    }

    #[test]
    fn test_activity_options_from_workflow_config() {
        let workflow = WorkflowConfig::default();

        let fetch = workflow.fetch_options();
        assert_eq!(fetch.start_to_close_timeout, Duration::from_secs(3600));
        assert_eq!(fetch.heartbeat_timeout, Some(Duration::from_secs(300)));

        let child = workflow.activity_options();
        assert!(child.start_to_close_timeout > fetch.start_to_close_timeout);
        assert_eq!(child.heartbeat_timeout, None);
        assert_eq!(child.retry_policy, fetch.retry_policy);
    }

    #[test]
    fn test_sanitized_config_hides_paths() {
        let config = Config {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            downloader: DownloaderConfig {
                program: PathBuf::from("/opt/tools/get_iplayer"),
                ..DownloaderConfig::new("/srv/downloads")
            },
            catalogue: CatalogueConfig::default(),
            store: StoreConfig {
                root: PathBuf::from("/srv/objects"),
                bucket: "programmes".to_string(),
            },
            bus: BusConfig::default(),
            workflow: WorkflowConfig::default(),
        };

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert_eq!(sanitized.downloader.program, "get_iplayer");
        assert!(!json.contains("/srv/downloads"));
        assert!(!json.contains("/srv/objects"));
    }
}
