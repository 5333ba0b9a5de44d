use anyhow::Result;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;

use crate::core::error::FileServiceError;
use crate::core::location::{CopyOperation, FileLocation, ScannedFile, WriteRequest};
use crate::core::options::{CopyOptions, WriteOptions};

/// Path normalization for backend-specific requirements
pub trait PathNormalizer {
    /// Canonicalize the path component of a location for this backend
    fn normalize(&self, location: &FileLocation) -> FileLocation;
}

/// Storage backend operations.
///
/// Lookups report a missing file as `Ok(None)` or an empty listing. Every
/// other failure is an error.
pub trait Backend: Send + Sync {
    /// Stat a file and fingerprint its content
    fn scan(&self, file: &FileLocation) -> impl Future<Output=Result<Option<ScannedFile>>> + Send;

    /// Lazily list every file at or below a location.
    ///
    /// Each call starts a fresh listing.
    fn list(&self, file_or_folder: &FileLocation) -> BoxStream<'_, Result<ScannedFile>>;

    /// Read the whole body of a file known to exist
    fn read_file(&self, file: &ScannedFile) -> impl Future<Output=Result<Bytes>> + Send;

    /// Persist a body, creating any missing parent structure
    fn write_file(&self, request: WriteRequest, options: &WriteOptions) -> impl Future<Output=Result<()>> + Send;

    fn delete_file(&self, file: &ScannedFile) -> impl Future<Output=Result<()>> + Send;

    /// Suspend until the file is observed to exist
    fn wait_for_file_to_exist(&self, file: &FileLocation) -> impl Future<Output=Result<()>> + Send;

    /// Copy within this backend using its native primitive
    fn copy_file(&self, operation: &CopyOperation, options: &CopyOptions) -> impl Future<Output=Result<()>> + Send;

    /// Canonical identity of a location
    fn to_location_string(&self, file: &FileLocation) -> String;

    /// Time-limited URL for reading a file
    fn read_url(&self, file: &ScannedFile, expires: Duration) -> impl Future<Output=Result<String>> + Send {
        let _ = expires;
        let location = file.location.to_location_string();
        async move { Err(FileServiceError::unsupported("read_url", location).into()) }
    }
}
