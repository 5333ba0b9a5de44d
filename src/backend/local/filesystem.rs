use anyhow::{Context, Result};
use async_stream::try_stream;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::backend::local::file_ops;
use crate::backend::traits::{Backend, PathNormalizer};
use crate::core::error::FileServiceError;
use crate::core::location::{mime_type_for, CopyOperation, FileLocation, ScannedFile, WriteRequest};
use crate::core::options::{CopyOptions, WriteOptions};
use crate::core::scanner::ContentScanner;

/// Default interval between existence checks
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(100);

/// Re-applies OS path cleaning to local locations
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPathNormalizer;

impl PathNormalizer for LocalPathNormalizer {
    fn normalize(&self, location: &FileLocation) -> FileLocation {
        match location {
            FileLocation::Local { path } => FileLocation::local(path),
            other => other.clone(),
        }
    }
}

/// Local filesystem backend
pub struct LocalFileSystem {
    normalizer: LocalPathNormalizer,
    scanner: ContentScanner,
    poll_period: Duration,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::with_poll_period(DEFAULT_POLL_PERIOD)
    }

    pub fn with_poll_period(poll_period: Duration) -> Self {
        Self {
            normalizer: LocalPathNormalizer,
            scanner: ContentScanner::new(),
            poll_period,
        }
    }

    fn local_path(&self, location: &FileLocation) -> Result<PathBuf> {
        match self.normalizer.normalize(location) {
            FileLocation::Local { path } => Ok(path),
            other => Err(FileServiceError::unsupported("local filesystem access", other.to_location_string()).into()),
        }
    }

    async fn scan_path(&self, path: &Path) -> Result<Option<ScannedFile>> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", path.display()));
            }
        };

        if !metadata.is_file() {
            return Ok(None);
        }

        let info = self.scanner.scan_file(path).await?;
        let location = FileLocation::local(path);

        Ok(Some(ScannedFile {
            mime_type: mime_type_for(&location.key()),
            location,
            content_hash: info.md5,
            size: info.size,
        }))
    }

    /// Depth-first walk holding one open directory handle per level
    fn walk(&self, root: PathBuf) -> impl Stream<Item=Result<ScannedFile>> + Send + '_ {
        try_stream! {
            let root_metadata = match tokio::fs::metadata(&root).await {
                Ok(m) => Some(m),
                Err(e) if e.kind() == ErrorKind::NotFound => None,
                Err(e) => Err(e).with_context(|| format!("Failed to stat {}", root.display()))?,
            };

            let mut stack = Vec::new();

            if let Some(metadata) = root_metadata {
                if metadata.is_file() {
                    if let Some(file) = self.scan_path(&root).await? {
                        yield file;
                    }
                } else if metadata.is_dir() {
                    let entries = tokio::fs::read_dir(&root).await
                        .with_context(|| format!("Failed to read directory {}", root.display()))?;
                    stack.push(entries);
                }
            }

            loop {
                let next = match stack.last_mut() {
                    Some(entries) => entries.next_entry().await?,
                    None => break,
                };

                let Some(entry) = next else {
                    stack.pop();
                    continue;
                };

                let path = entry.path();
                let file_type = entry.file_type().await
                    .with_context(|| format!("Failed to read file type of {}", path.display()))?;

                if file_type.is_dir() {
                    let entries = tokio::fs::read_dir(&path).await
                        .with_context(|| format!("Failed to read directory {}", path.display()))?;
                    stack.push(entries);
                } else if let Some(file) = self.scan_path(&path).await? {
                    yield file;
                }
            }
        }
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for LocalFileSystem {
    async fn scan(&self, file: &FileLocation) -> Result<Option<ScannedFile>> {
        let path = self.local_path(file)?;
        self.scan_path(&path).await
    }

    fn list(&self, file_or_folder: &FileLocation) -> BoxStream<'_, Result<ScannedFile>> {
        match self.local_path(file_or_folder) {
            Ok(root) => self.walk(root).boxed(),
            Err(e) => futures::stream::once(async move { Err(e) }).boxed(),
        }
    }

    async fn read_file(&self, file: &ScannedFile) -> Result<Bytes> {
        let path = self.local_path(&file.location)?;
        let body = tokio::fs::read(&path).await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Bytes::from(body))
    }

    async fn write_file(&self, request: WriteRequest, options: &WriteOptions) -> Result<()> {
        let path = self.local_path(&request.destination)?;
        file_ops::write_file(&path, &request.body).await?;

        if let Some(progress) = &options.progress {
            let total = request.body.len() as u64;
            progress(&request.destination, total, total);
        }
        Ok(())
    }

    async fn delete_file(&self, file: &ScannedFile) -> Result<()> {
        let path = self.local_path(&file.location)?;
        debug!("Deleting file: {:?}", path);
        tokio::fs::remove_file(&path).await
            .with_context(|| format!("Failed to delete {}", path.display()))
    }

    async fn wait_for_file_to_exist(&self, file: &FileLocation) -> Result<()> {
        let path = self.local_path(file)?;
        while !tokio::fs::try_exists(&path).await? {
            tokio::time::sleep(self.poll_period).await;
        }
        Ok(())
    }

    async fn copy_file(&self, operation: &CopyOperation, _options: &CopyOptions) -> Result<()> {
        let src = self.local_path(&operation.source().location)?;
        let dst = self.local_path(operation.destination())?;
        file_ops::copy_file(&src, &dst).await?;
        Ok(())
    }

    fn to_location_string(&self, file: &FileLocation) -> String {
        self.normalizer.normalize(file).to_location_string()
    }
}
