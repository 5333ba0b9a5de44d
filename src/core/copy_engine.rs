use anyhow::Result;
use futures::future;
use futures::TryStreamExt;
use tracing::{debug, info};

use crate::backend::traits::Backend;
use crate::core::batch::process_in_batches;
use crate::core::error::FileServiceError;
use crate::core::location::{CopyOperation, FileLocation, ScannedFile};
use crate::core::options::CopyOptions;

/// Totals for one recursive copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub files_copied: u64,
    pub files_skipped: u64,
    pub bytes_copied: u64,
}

enum CopyOutcome {
    Copied { bytes: u64 },
    Skipped,
}

/// Mirrors every file under a source folder to the same relative place
/// under a destination folder, through any backend.
pub struct CopyEngine<'a, B> {
    backend: &'a B,
}

impl<'a, B: Backend> CopyEngine<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Copy a file, or every file under a folder.
    ///
    /// Files are listed lazily and copied in batches of `options.concurrency`.
    /// The first failure stops the copy once its batch has settled.
    pub async fn copy(
        &self,
        source: &FileLocation,
        destination: &FileLocation,
        options: &CopyOptions,
    ) -> Result<CopyReport> {
        info!("Starting copy: {} -> {}", source, destination);

        // Files the copy itself creates must not be listed back
        let nested = destination.is_within(source) && !destination.same_location(source);
        let listing = self.backend.list(source).try_filter(move |file| {
            let own_output = nested && file.location.is_within(destination);
            if own_output {
                debug!("Ignoring copy output in source listing: {}", file.location);
            }
            future::ready(!own_output)
        });

        let outcomes = process_in_batches(listing, options.concurrency, move |file| {
            self.copy_one(file, source, destination, options)
        })
        .await?;

        let report = outcomes.into_iter().fold(CopyReport::default(), |mut report, outcome| {
            match outcome {
                CopyOutcome::Copied { bytes } => {
                    report.files_copied += 1;
                    report.bytes_copied += bytes;
                }
                CopyOutcome::Skipped => report.files_skipped += 1,
            }
            report
        });

        info!(
            "Copy finished: {} -> {} ({} copied, {} skipped, {} bytes)",
            source, destination, report.files_copied, report.files_skipped, report.bytes_copied
        );

        Ok(report)
    }

    async fn copy_one(
        &self,
        file: ScannedFile,
        source_folder: &FileLocation,
        destination_folder: &FileLocation,
        options: &CopyOptions,
    ) -> Result<CopyOutcome> {
        let destination = file.location.rebase(source_folder, destination_folder).ok_or_else(|| {
            FileServiceError::InvariantViolation(format!(
                "listed file {} is outside {}",
                file.location, source_folder
            ))
        })?;

        if !self.proceed_with_copy(&file, &destination, options).await? {
            debug!("Skipping {} -> {}", file.location, destination);
            return Ok(CopyOutcome::Skipped);
        }

        let bytes = file.size;
        let operation = CopyOperation::new(file, destination)?;
        self.backend.copy_file(&operation, options).await?;

        debug!("Copied {} -> {}", operation.source().location, operation.destination());

        if let Some(listener) = &options.listener {
            listener(&operation);
        }

        Ok(CopyOutcome::Copied { bytes })
    }

    /// Whether `source` should be copied over `destination`.
    ///
    /// A file is never copied onto itself. When overwriting without
    /// `skip_same` the destination is not inspected at all.
    pub async fn proceed_with_copy(
        &self,
        source: &ScannedFile,
        destination: &FileLocation,
        options: &CopyOptions,
    ) -> Result<bool> {
        if self.backend.to_location_string(&source.location) == self.backend.to_location_string(destination) {
            return Ok(false);
        }

        if options.always_overwrites() {
            return Ok(true);
        }

        match self.backend.scan(destination).await? {
            None => Ok(true),
            Some(existing) => Ok(options.overwrite && !(options.skip_same && source.same_content(&existing))),
        }
    }
}
