pub mod models;

pub use models::{LocalConfig, LogRotation, S3Config, ServiceConfig, TransferJob};

use anyhow::{Context, Result};
use std::path::Path;

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "duofs_config.json";

pub async fn load_config(path: &Path) -> Result<ServiceConfig> {
    if !path.exists() {
        anyhow::bail!(
            "Configuration file not found: {}\n\nCreate a config file first. Example:\n{}",
            path.display(),
            example_config()
        );
    }

    let content = tokio::fs::read_to_string(path).await
        .context("Failed to read config file")?;

    let config: ServiceConfig = serde_json::from_str(&content)
        .context("Failed to parse config file")?;

    Ok(config)
}

pub fn example_config() -> &'static str {
    r#"{
  "jobs": [
    {
      "type": "copy",
      "id": "publish",
      "source": "./site",
      "destination": "s3://my-bucket/site/",
      "overwrite": true,
      "skip_same": true,
      "concurrency": 8
    },
    {
      "type": "delete",
      "id": "purge",
      "target": "s3://my-bucket/tmp/"
    }
  ],
  "log_level": "info",
  "log_directory": "./logs",
  "log_rotation": {
    "type": "daily"
  },
  "s3": {
    "region": "us-east-1"
  }
}"#
}
