use anyhow::{Context, Result};
use tracing::{error, info};

use crate::backend::local::LocalFileSystem;
use crate::backend::poly::{NodeFileSystem, PolyFileSystem};
use crate::backend::s3::S3FileSystem;
use crate::backend::traits::Backend;
use crate::config::{ServiceConfig, TransferJob};
use crate::core::copy_engine::CopyReport;
use crate::core::delete_engine::DeleteReport;
use crate::core::options::{CopyOptions, DeleteOptions};
use crate::core::service::FileService;
use crate::core::validation::validate_job;

/// Result of one finished job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    Copy(CopyReport),
    Delete(DeleteReport),
}

/// Runs configured jobs one after another
pub struct JobRunner<B> {
    service: FileService<B>,
}

impl JobRunner<NodeFileSystem> {
    /// Local filesystem plus S3, tuned from the config
    pub fn from_config(config: &ServiceConfig) -> Self {
        let local = LocalFileSystem::with_poll_period(config.local.poll_period());
        let object = S3FileSystem::new(config.s3.clone());
        Self::new(FileService::new(PolyFileSystem::new(local, object)))
    }
}

impl<B: Backend> JobRunner<B> {
    pub fn new(service: FileService<B>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &FileService<B> {
        &self.service
    }

    /// Run every job in order, stopping at the first failure
    pub async fn run_all(&self, jobs: &[TransferJob]) -> Result<Vec<JobReport>> {
        info!("Running {} job(s)", jobs.len());

        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            let report = self.execute_job(job).await
                .with_context(|| format!("Job {} failed", job.id()))?;
            reports.push(report);
        }

        info!("All jobs completed");
        Ok(reports)
    }

    pub async fn execute_job(&self, job: &TransferJob) -> Result<JobReport> {
        info!("Executing job: {}", job.id());

        validate_job(job)?;

        let result = match job {
            TransferJob::Copy { source, destination, overwrite, skip_same, concurrency, .. } => {
                let options = CopyOptions::default()
                    .concurrency(*concurrency)
                    .overwrite(*overwrite)
                    .skip_same(*skip_same)
                    .listener(|operation| {
                        info!("Copied {} -> {}", operation.source().location, operation.destination());
                    });

                self.service.copy(source, destination, &options).await.map(JobReport::Copy)
            }
            TransferJob::Delete { target, concurrency, .. } => {
                let options = DeleteOptions::default()
                    .concurrency(*concurrency)
                    .listener(|file| info!("Deleted {}", file.location));

                self.service.delete(target, &options).await.map(JobReport::Delete)
            }
        };

        match &result {
            Ok(report) => info!("Job completed successfully: {}: {:?}", job.id(), report),
            Err(e) => error!("Job failed: {}: {:#}", job.id(), e),
        }

        result
    }
}
