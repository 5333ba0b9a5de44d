use anyhow::{bail, Result};
use tracing::{debug, warn};

use crate::config::TransferJob;
use crate::core::location::FileLocation;

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub warnings: Vec<String>,
}

/// Check a job before it touches any backend
pub fn validate_job(job: &TransferJob) -> Result<ValidationResult> {
    let mut warnings = Vec::new();

    debug!("Validating job: {}", job.id());

    if job.id().trim().is_empty() {
        bail!("Job id cannot be empty");
    }

    if job.concurrency() == 0 {
        bail!("Job {}: concurrency must be at least 1", job.id());
    }

    match job {
        TransferJob::Copy { source, destination, .. } => {
            if source.same_location(destination) {
                bail!("Job {}: source and destination cannot be the same", job.id());
            }

            if destination.is_within(source) {
                bail!(
                    "Job {}: destination {} cannot be inside source {}",
                    job.id(), destination, source
                );
            }
        }
        TransferJob::Delete { target, .. } => {
            if is_bucket_root(target) {
                warnings.push(format!("Delete targets the whole bucket: {}", target));
            }
        }
    }

    for warning in &warnings {
        warn!("Job {}: {}", job.id(), warning);
    }

    Ok(ValidationResult {
        is_valid: true,
        warnings,
    })
}

fn is_bucket_root(location: &FileLocation) -> bool {
    matches!(location, FileLocation::Object { key, .. } if key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy_job(source: &str, destination: &str, concurrency: usize) -> TransferJob {
        TransferJob::Copy {
            id: "job".to_string(),
            source: source.parse().unwrap(),
            destination: destination.parse().unwrap(),
            overwrite: false,
            skip_same: true,
            concurrency,
        }
    }

    #[test]
    fn test_valid_copy_job() {
        let result = validate_job(&copy_job("./site", "s3://bucket/site/", 5)).unwrap();
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(validate_job(&copy_job("./site", "s3://bucket/site/", 0)).is_err());
    }

    #[test]
    fn test_same_source_and_destination_rejected() {
        assert!(validate_job(&copy_job("s3://bucket/a/", "s3://bucket/a/", 5)).is_err());
        assert!(validate_job(&copy_job("./data", "data", 5)).is_err());
    }

    #[test]
    fn test_destination_inside_source_rejected() {
        assert!(validate_job(&copy_job("s3://bucket/a/", "s3://bucket/a/backup/", 5)).is_err());
        assert!(validate_job(&copy_job("./data", "./data/mirror", 5)).is_err());
    }

    #[test]
    fn test_sibling_destination_allowed() {
        assert!(validate_job(&copy_job("./data", "./data-mirror", 5)).is_ok());
    }

    #[test]
    fn test_bucket_root_delete_warns() {
        let job = TransferJob::Delete {
            id: "purge".to_string(),
            target: "s3://bucket".parse().unwrap(),
            concurrency: 5,
        };
        let result = validate_job(&job).unwrap();
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_empty_id_rejected() {
        let job = TransferJob::Delete {
            id: "  ".to_string(),
            target: "s3://bucket/tmp/".parse().unwrap(),
            concurrency: 5,
        };
        assert!(validate_job(&job).is_err());
    }
}
