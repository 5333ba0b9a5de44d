//! Instrumented backend wrapper for engine tests

use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::traits::Backend;
use crate::core::location::{CopyOperation, FileLocation, ScannedFile, WriteRequest};
use crate::core::options::{CopyOptions, WriteOptions};

pub struct CountingBackend<B> {
    inner: B,
    scans: AtomicUsize,
    copies: AtomicUsize,
    deletes: AtomicUsize,
    fail_on: Mutex<Option<String>>,
}

impl<B: Backend> CountingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            scans: AtomicUsize::new(0),
            copies: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_on: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Scans, copies and deletes touching this location fail
    pub fn fail_on(&self, location: &FileLocation) {
        *self.fail_on.lock().unwrap() = Some(location.to_location_string());
    }

    fn check(&self, location: &FileLocation) -> Result<()> {
        match self.fail_on.lock().unwrap().as_deref() {
            Some(failing) if failing == location.to_location_string() => {
                Err(anyhow!("injected failure for {}", failing))
            }
            _ => Ok(()),
        }
    }
}

impl<B: Backend> Backend for CountingBackend<B> {
    async fn scan(&self, file: &FileLocation) -> Result<Option<ScannedFile>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.check(file)?;
        self.inner.scan(file).await
    }

    fn list(&self, file_or_folder: &FileLocation) -> BoxStream<'_, Result<ScannedFile>> {
        self.inner.list(file_or_folder)
    }

    async fn read_file(&self, file: &ScannedFile) -> Result<Bytes> {
        self.inner.read_file(file).await
    }

    async fn write_file(&self, request: WriteRequest, options: &WriteOptions) -> Result<()> {
        self.inner.write_file(request, options).await
    }

    async fn delete_file(&self, file: &ScannedFile) -> Result<()> {
        self.check(&file.location)?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_file(file).await
    }

    async fn wait_for_file_to_exist(&self, file: &FileLocation) -> Result<()> {
        self.inner.wait_for_file_to_exist(file).await
    }

    async fn copy_file(&self, operation: &CopyOperation, options: &CopyOptions) -> Result<()> {
        self.check(&operation.source().location)?;
        self.copies.fetch_add(1, Ordering::SeqCst);
        self.inner.copy_file(operation, options).await
    }

    fn to_location_string(&self, file: &FileLocation) -> String {
        self.inner.to_location_string(file)
    }
}
