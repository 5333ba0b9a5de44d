use anyhow::Result;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use tracing::debug;

use crate::backend::local::LocalFileSystem;
use crate::backend::s3::S3FileSystem;
use crate::backend::traits::Backend;
use crate::core::location::{CopyOperation, FileLocation, ScannedFile, WriteRequest};
use crate::core::options::{CopyOptions, WriteOptions};
use crate::core::path::BackendKind;

/// Local filesystem plus S3, the production pairing
pub type NodeFileSystem = PolyFileSystem<LocalFileSystem, S3FileSystem>;

/// Routes each location to the backend that owns it.
///
/// `Local` locations go to `L`, `Object` locations to `O`. Copies whose ends
/// live on different backends are streamed through a read and a write.
pub struct PolyFileSystem<L, O> {
    local: L,
    object: O,
}

impl<L: Backend, O: Backend> PolyFileSystem<L, O> {
    pub fn new(local: L, object: O) -> Self {
        Self { local, object }
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn object(&self) -> &O {
        &self.object
    }
}

/// Read from one backend and write into another
async fn copy_across<A: Backend, B: Backend>(
    from: &A,
    to: &B,
    operation: &CopyOperation,
    options: &CopyOptions,
) -> Result<()> {
    debug!("Cross-backend copy: {} -> {}", operation.source().location, operation.destination());

    let body: Bytes = from.read_file(operation.source()).await?;
    let request = WriteRequest::new(operation.destination().clone(), body);
    to.write_file(request, &options.write_options()).await
}

impl<L: Backend, O: Backend> Backend for PolyFileSystem<L, O> {
    async fn scan(&self, file: &FileLocation) -> Result<Option<ScannedFile>> {
        match file.kind() {
            BackendKind::Local => self.local.scan(file).await,
            BackendKind::Object => self.object.scan(file).await,
        }
    }

    fn list(&self, file_or_folder: &FileLocation) -> BoxStream<'_, Result<ScannedFile>> {
        match file_or_folder.kind() {
            BackendKind::Local => self.local.list(file_or_folder),
            BackendKind::Object => self.object.list(file_or_folder),
        }
    }

    async fn read_file(&self, file: &ScannedFile) -> Result<Bytes> {
        match file.location.kind() {
            BackendKind::Local => self.local.read_file(file).await,
            BackendKind::Object => self.object.read_file(file).await,
        }
    }

    async fn write_file(&self, request: WriteRequest, options: &WriteOptions) -> Result<()> {
        match request.destination.kind() {
            BackendKind::Local => self.local.write_file(request, options).await,
            BackendKind::Object => self.object.write_file(request, options).await,
        }
    }

    async fn delete_file(&self, file: &ScannedFile) -> Result<()> {
        match file.location.kind() {
            BackendKind::Local => self.local.delete_file(file).await,
            BackendKind::Object => self.object.delete_file(file).await,
        }
    }

    async fn wait_for_file_to_exist(&self, file: &FileLocation) -> Result<()> {
        match file.kind() {
            BackendKind::Local => self.local.wait_for_file_to_exist(file).await,
            BackendKind::Object => self.object.wait_for_file_to_exist(file).await,
        }
    }

    async fn copy_file(&self, operation: &CopyOperation, options: &CopyOptions) -> Result<()> {
        match (operation.source().location.kind(), operation.destination().kind()) {
            (BackendKind::Local, BackendKind::Local) => self.local.copy_file(operation, options).await,
            (BackendKind::Object, BackendKind::Object) => self.object.copy_file(operation, options).await,
            (BackendKind::Local, BackendKind::Object) => copy_across(&self.local, &self.object, operation, options).await,
            (BackendKind::Object, BackendKind::Local) => copy_across(&self.object, &self.local, operation, options).await,
        }
    }

    fn to_location_string(&self, file: &FileLocation) -> String {
        match file.kind() {
            BackendKind::Local => self.local.to_location_string(file),
            BackendKind::Object => self.object.to_location_string(file),
        }
    }

    async fn read_url(&self, file: &ScannedFile, expires: Duration) -> Result<String> {
        match file.location.kind() {
            BackendKind::Local => self.local.read_url(file, expires).await,
            BackendKind::Object => self.object.read_url(file, expires).await,
        }
    }
}
