use anyhow::{anyhow, Result};
use async_stream::try_stream;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::traits::{Backend, PathNormalizer};
use crate::core::location::{mime_type_for, CopyOperation, FileLocation, ScannedFile, WriteRequest};
use crate::core::options::{CopyOptions, WriteOptions};
use crate::core::path::BackendKind;
use crate::core::scanner::ContentScanner;

/// Default number of entries fetched per listing page
pub const DEFAULT_MEMORY_PAGE_SIZE: usize = 1000;

const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(100);

/// Normalizes either kind of location by rebuilding it
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyPathNormalizer;

impl PathNormalizer for AnyPathNormalizer {
    fn normalize(&self, location: &FileLocation) -> FileLocation {
        match location {
            FileLocation::Local { path } => FileLocation::local(path),
            FileLocation::Object { bucket, key } => FileLocation::object(bucket.clone(), key),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    location: FileLocation,
    body: Bytes,
}

/// Backend that keeps file bodies in process memory.
///
/// Accepts both local and object locations, keyed by location string.
pub struct MemoryFileSystem {
    normalizer: AnyPathNormalizer,
    scanner: ContentScanner,
    store: RwLock<BTreeMap<String, StoredFile>>,
    page_size: usize,
    poll_period: Duration,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_MEMORY_PAGE_SIZE)
    }

    /// Listing fetches at most `page_size` entries per lock acquisition
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            normalizer: AnyPathNormalizer,
            scanner: ContentScanner::new(),
            store: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            poll_period: DEFAULT_POLL_PERIOD,
        }
    }

    pub fn poll_period(mut self, poll_period: Duration) -> Self {
        self.poll_period = poll_period;
        self
    }

    /// Number of stored files
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    fn to_scanned(&self, stored: &StoredFile) -> ScannedFile {
        let info = self.scanner.scan(&stored.body);
        ScannedFile {
            mime_type: mime_type_for(&stored.location.key()),
            location: stored.location.clone(),
            content_hash: info.md5,
            size: info.size,
        }
    }

    async fn fetch_page(&self, prefix: &str, after: Option<&str>) -> Vec<(String, StoredFile)> {
        let store = self.store.read().await;
        let start = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Included(prefix),
        };

        store
            .range::<str, _>((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(self.page_size)
            .map(|(key, stored)| (key.clone(), stored.clone()))
            .collect()
    }

    /// `separator` limits matches to whole path components under `prefix`
    fn pages(&self, prefix: String, separator: Option<char>) -> impl Stream<Item=Result<ScannedFile>> + Send + '_ {
        try_stream! {
            let mut cursor: Option<String> = None;

            loop {
                let page = self.fetch_page(&prefix, cursor.as_deref()).await;
                let full_page = page.len() == self.page_size;

                cursor = page.last().map(|(key, _)| key.clone());

                for (key, stored) in &page {
                    if in_scope(key, &prefix, separator) {
                        yield self.to_scanned(stored);
                    }
                }

                if !full_page {
                    break;
                }
            }
        }
    }
}

/// Object listings are plain prefix matches. Local listings only cover the
/// path itself and what lies below it.
fn in_scope(key: &str, prefix: &str, separator: Option<char>) -> bool {
    match separator {
        None => true,
        Some(separator) => {
            key.len() == prefix.len()
                || prefix.ends_with(separator)
                || key[prefix.len()..].starts_with(separator)
        }
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryFileSystem {
    async fn scan(&self, file: &FileLocation) -> Result<Option<ScannedFile>> {
        let file = self.normalizer.normalize(file);
        let store = self.store.read().await;
        Ok(store.get(&file.to_location_string()).map(|stored| self.to_scanned(stored)))
    }

    fn list(&self, file_or_folder: &FileLocation) -> BoxStream<'_, Result<ScannedFile>> {
        let location = self.normalizer.normalize(file_or_folder);
        let separator = match location.kind() {
            BackendKind::Local => Some(BackendKind::Local.separator()),
            BackendKind::Object => None,
        };
        self.pages(location.to_location_string(), separator).boxed()
    }

    async fn read_file(&self, file: &ScannedFile) -> Result<Bytes> {
        let location = self.normalizer.normalize(&file.location).to_location_string();
        let store = self.store.read().await;
        store
            .get(&location)
            .map(|stored| stored.body.clone())
            .ok_or_else(|| anyhow!("File disappeared before it could be read: {}", location))
    }

    async fn write_file(&self, request: WriteRequest, options: &WriteOptions) -> Result<()> {
        let location = self.normalizer.normalize(&request.destination);
        let total = request.body.len() as u64;
        debug!("Writing {} bytes to memory: {}", total, location);

        self.store.write().await.insert(
            location.to_location_string(),
            StoredFile {
                location: location.clone(),
                body: request.body,
            },
        );

        if let Some(progress) = &options.progress {
            progress(&location, total, total);
        }
        Ok(())
    }

    async fn delete_file(&self, file: &ScannedFile) -> Result<()> {
        let location = self.normalizer.normalize(&file.location).to_location_string();
        self.store.write().await.remove(&location);
        Ok(())
    }

    async fn wait_for_file_to_exist(&self, file: &FileLocation) -> Result<()> {
        let location = self.normalizer.normalize(file).to_location_string();
        while !self.store.read().await.contains_key(&location) {
            tokio::time::sleep(self.poll_period).await;
        }
        Ok(())
    }

    async fn copy_file(&self, operation: &CopyOperation, _options: &CopyOptions) -> Result<()> {
        let source = self.normalizer.normalize(&operation.source().location).to_location_string();
        let destination = self.normalizer.normalize(operation.destination());

        let mut store = self.store.write().await;
        let body = store
            .get(&source)
            .map(|stored| stored.body.clone())
            .ok_or_else(|| anyhow!("Copy source disappeared: {}", source))?;

        store.insert(
            destination.to_location_string(),
            StoredFile {
                location: destination,
                body,
            },
        );
        Ok(())
    }

    fn to_location_string(&self, file: &FileLocation) -> String {
        self.normalizer.normalize(file).to_location_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn put(fs: &MemoryFileSystem, location: FileLocation, body: &str) {
        fs.write_file(WriteRequest::new(location, body.to_string()), &WriteOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scan_and_read_round_trip() {
        let fs = MemoryFileSystem::new();
        let location = FileLocation::object("foo", "dir/test-file.txt");
        put(&fs, location.clone(), "This is a test file").await;

        let scanned = fs.scan(&location).await.unwrap().unwrap();
        assert_eq!(scanned.content_hash, "0b26e313ed4a7ca6904b0e9369e5b957");
        assert_eq!(scanned.size, 19);
        assert_eq!(fs.read_file(&scanned).await.unwrap(), Bytes::from("This is a test file"));
    }

    #[tokio::test]
    async fn test_scan_missing_is_none() {
        let fs = MemoryFileSystem::new();
        assert!(fs.scan(&FileLocation::object("foo", "nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_pages_through_prefix_only() {
        let fs = MemoryFileSystem::with_page_size(1);
        for key in ["a/1.txt", "a/2.txt", "a/3.txt", "b/1.txt"] {
            put(&fs, FileLocation::object("foo", key), key).await;
        }

        let listed: Vec<ScannedFile> = fs.list(&FileLocation::object("foo", "a/")).try_collect().await.unwrap();
        let keys: Vec<String> = listed.iter().map(|f| f.location.key().into_owned()).collect();
        assert_eq!(keys, vec!["a/1.txt", "a/2.txt", "a/3.txt"]);
    }

    #[tokio::test]
    async fn test_list_is_restartable() {
        let fs = MemoryFileSystem::with_page_size(2);
        for key in ["x/1", "x/2", "x/3"] {
            put(&fs, FileLocation::object("foo", key), key).await;
        }
        let folder = FileLocation::object("foo", "x/");

        let first: Vec<ScannedFile> = fs.list(&folder).try_collect().await.unwrap();
        let second: Vec<ScannedFile> = fs.list(&folder).try_collect().await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let fs = MemoryFileSystem::new();
        put(&fs, FileLocation::object("one", "k"), "1").await;
        put(&fs, FileLocation::object("two", "k"), "2").await;

        let listed: Vec<ScannedFile> = fs.list(&FileLocation::object("one", "")).try_collect().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].location, FileLocation::object("one", "k"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_list_stops_at_component_boundary() {
        let fs = MemoryFileSystem::with_page_size(1);
        put(&fs, FileLocation::local("/src/a.txt"), "a").await;
        put(&fs, FileLocation::local("/src/sub/b.txt"), "b").await;
        put(&fs, FileLocation::local("/src2/c.txt"), "c").await;
        put(&fs, FileLocation::local("/srcfile"), "d").await;

        let listed: Vec<ScannedFile> = fs.list(&FileLocation::local("/src")).try_collect().await.unwrap();
        let keys: Vec<String> = listed.iter().map(|f| f.location.key().into_owned()).collect();
        assert_eq!(keys, vec!["/src/a.txt", "/src/sub/b.txt"]);

        let single: Vec<ScannedFile> = fs.list(&FileLocation::local("/src/a.txt")).try_collect().await.unwrap();
        assert_eq!(single.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let fs = MemoryFileSystem::new();
        let location = FileLocation::local("/virtual/file.txt");
        put(&fs, location.clone(), "x").await;

        let scanned = fs.scan(&location).await.unwrap().unwrap();
        fs.delete_file(&scanned).await.unwrap();

        assert!(fs.is_empty().await);
    }

    #[tokio::test]
    async fn test_wait_for_file_to_exist() {
        let fs = std::sync::Arc::new(MemoryFileSystem::new().poll_period(Duration::from_millis(5)));
        let location = FileLocation::object("foo", "late.txt");

        let writer_fs = fs.clone();
        let writer_location = location.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            put(&writer_fs, writer_location, "here").await;
        });

        fs.wait_for_file_to_exist(&location).await.unwrap();
        writer.await.unwrap();
        assert_eq!(fs.len().await, 1);
    }
}
