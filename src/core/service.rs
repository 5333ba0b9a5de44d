use anyhow::Result;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use tracing::debug;

use crate::backend::traits::Backend;
use crate::core::copy_engine::{CopyEngine, CopyReport};
use crate::core::delete_engine::{DeleteEngine, DeleteReport};
use crate::core::location::{FileLocation, ScannedFile, WriteRequest};
use crate::core::options::{CopyOptions, DeleteOptions, WriteOptions};

/// One entry point for files on any backend.
///
/// Single-file operations sit directly on the backend; recursive copies and
/// deletes are handed to the engines.
pub struct FileService<B> {
    backend: B,
}

impl<B: Backend> FileService<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn scan(&self, file: &FileLocation) -> Result<Option<ScannedFile>> {
        self.backend.scan(file).await
    }

    /// Every file at or under `file_or_folder`, fetched page by page
    pub fn list(&self, file_or_folder: &FileLocation) -> BoxStream<'_, Result<ScannedFile>> {
        self.backend.list(file_or_folder)
    }

    pub async fn read_file(&self, file: &ScannedFile) -> Result<Bytes> {
        self.backend.read_file(file).await
    }

    /// Body of `file`, or `None` if it does not exist
    pub async fn read(&self, file: &FileLocation) -> Result<Option<Bytes>> {
        match self.backend.scan(file).await? {
            Some(scanned) => Ok(Some(self.backend.read_file(&scanned).await?)),
            None => Ok(None),
        }
    }

    /// Write a file and return its fresh scan.
    ///
    /// Without `overwrite` an existing destination is returned untouched.
    /// The result is `None` only if the file vanished right after writing.
    pub async fn write(&self, request: WriteRequest, options: &WriteOptions) -> Result<Option<ScannedFile>> {
        if !options.overwrite {
            if let Some(existing) = self.backend.scan(&request.destination).await? {
                debug!("Not overwriting existing file: {}", existing.location);
                return Ok(Some(existing));
            }
        }

        let destination = request.destination.clone();
        self.backend.write_file(request, options).await?;
        self.backend.scan(&destination).await
    }

    pub async fn copy(
        &self,
        source: &FileLocation,
        destination: &FileLocation,
        options: &CopyOptions,
    ) -> Result<CopyReport> {
        CopyEngine::new(&self.backend).copy(source, destination, options).await
    }

    pub async fn delete(&self, file_or_folder: &FileLocation, options: &DeleteOptions) -> Result<DeleteReport> {
        DeleteEngine::new(&self.backend).delete(file_or_folder, options).await
    }

    /// Suspend until `file` exists, then scan it
    pub async fn wait_for_file(&self, file: &FileLocation) -> Result<Option<ScannedFile>> {
        self.backend.wait_for_file_to_exist(file).await?;
        self.backend.scan(file).await
    }

    /// Time-limited URL for downloading `file`, or `None` if it does not exist
    pub async fn read_url(&self, file: &FileLocation, expires: Duration) -> Result<Option<String>> {
        match self.backend.scan(file).await? {
            Some(scanned) => Ok(Some(self.backend.read_url(&scanned, expires).await?)),
            None => Ok(None),
        }
    }

    pub fn to_location_string(&self, file: &FileLocation) -> String {
        self.backend.to_location_string(file)
    }
}
