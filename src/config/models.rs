use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::location::FileLocation;
use crate::core::options::DEFAULT_CONCURRENCY;

const DEFAULT_LOG_LEVEL: &str = "info";
/// Objects per list-objects page
pub const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_WAIT_POLL_PERIOD_MS: u64 = 5000;
const DEFAULT_WAIT_MAX_ATTEMPTS: u32 = 20;
/// Multipart upload part size, 8 MiB
pub const DEFAULT_UPLOAD_PART_SIZE: usize = 8 * 1024 * 1024;
const DEFAULT_LOCAL_POLL_PERIOD_MS: u64 = 100;

#[inline]
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[inline]
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

#[inline]
fn default_true() -> bool {
    true
}

#[inline]
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[inline]
fn default_wait_poll_period_ms() -> u64 {
    DEFAULT_WAIT_POLL_PERIOD_MS
}

#[inline]
fn default_wait_max_attempts() -> u32 {
    DEFAULT_WAIT_MAX_ATTEMPTS
}

#[inline]
fn default_upload_part_size() -> usize {
    DEFAULT_UPLOAD_PART_SIZE
}

#[inline]
fn default_local_poll_period_ms() -> u64 {
    DEFAULT_LOCAL_POLL_PERIOD_MS
}

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Jobs run in order
    pub jobs: Vec<TransferJob>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional log file directory (if None, only console logging)
    #[serde(default)]
    pub log_directory: Option<PathBuf>,

    /// Log file rotation strategy
    #[serde(default)]
    pub log_rotation: LogRotation,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub local: LocalConfig,
}

/// Log file rotation strategy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate daily
    #[default]
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}

/// One unit of work from the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransferJob {
    /// Mirror a file or folder to another location
    Copy {
        id: String,
        source: FileLocation,
        destination: FileLocation,
        #[serde(default)]
        overwrite: bool,
        #[serde(default = "default_true")]
        skip_same: bool,
        #[serde(default = "default_concurrency")]
        concurrency: usize,
    },

    /// Remove a file or everything under a folder
    Delete {
        id: String,
        target: FileLocation,
        #[serde(default = "default_concurrency")]
        concurrency: usize,
    },
}

impl TransferJob {
    pub fn id(&self) -> &str {
        match self {
            TransferJob::Copy { id, .. } | TransferJob::Delete { id, .. } => id,
        }
    }

    pub fn concurrency(&self) -> usize {
        match self {
            TransferJob::Copy { concurrency, .. } | TransferJob::Delete { concurrency, .. } => *concurrency,
        }
    }
}

/// S3 connection and tuning.
///
/// Unset credentials fall back to the standard AWS environment chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Config {
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Delay between existence checks while waiting for an object
    #[serde(default = "default_wait_poll_period_ms")]
    pub wait_poll_period_ms: u64,

    #[serde(default = "default_wait_max_attempts")]
    pub wait_max_attempts: u32,

    #[serde(default = "default_upload_part_size")]
    pub upload_part_size: usize,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            page_size: DEFAULT_PAGE_SIZE,
            wait_poll_period_ms: DEFAULT_WAIT_POLL_PERIOD_MS,
            wait_max_attempts: DEFAULT_WAIT_MAX_ATTEMPTS,
            upload_part_size: DEFAULT_UPLOAD_PART_SIZE,
        }
    }
}

/// Local filesystem tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalConfig {
    /// Delay between existence checks while waiting for a file
    #[serde(default = "default_local_poll_period_ms")]
    pub poll_period_ms: u64,
}

impl LocalConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: DEFAULT_LOCAL_POLL_PERIOD_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ServiceConfig = serde_json::from_str(r#"{"jobs": []}"#).unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_directory, None);
        assert_eq!(config.log_rotation, LogRotation::Daily);
        assert_eq!(config.s3, S3Config::default());
        assert_eq!(config.local.poll_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_jobs_are_tagged_by_type() {
        let json = r#"{
            "jobs": [
                {"type": "copy", "id": "publish", "source": "./site", "destination": "s3://bucket/site/", "overwrite": true},
                {"type": "delete", "id": "purge", "target": "s3://bucket/tmp/", "concurrency": 2}
            ]
        }"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.jobs[0],
            TransferJob::Copy {
                id: "publish".to_string(),
                source: FileLocation::local("./site"),
                destination: FileLocation::object("bucket", "site/"),
                overwrite: true,
                skip_same: true,
                concurrency: DEFAULT_CONCURRENCY,
            }
        );
        assert_eq!(config.jobs[1].id(), "purge");
        assert_eq!(config.jobs[1].concurrency(), 2);
    }

    #[test]
    fn test_partial_s3_section() {
        let json = r#"{"jobs": [], "s3": {"region": "eu-west-1", "page_size": 10}, "log_rotation": {"type": "never"}}"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.s3.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.s3.page_size, 10);
        assert_eq!(config.s3.upload_part_size, DEFAULT_UPLOAD_PART_SIZE);
        assert_eq!(config.log_rotation, LogRotation::Never);
    }

    #[test]
    fn test_bad_location_is_rejected() {
        let json = r#"{"jobs": [{"type": "delete", "id": "x", "target": "s3:///nobucket"}]}"#;
        assert!(serde_json::from_str::<ServiceConfig>(json).is_err());
    }
}
