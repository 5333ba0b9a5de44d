use anyhow::Result;
use tracing::{debug, info};

use crate::backend::traits::Backend;
use crate::core::batch::process_in_batches;
use crate::core::location::{FileLocation, ScannedFile};
use crate::core::options::DeleteOptions;

/// Totals for one recursive delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub files_deleted: u64,
    pub bytes_deleted: u64,
}

/// Removes a file, or every file under a folder
pub struct DeleteEngine<'a, B> {
    backend: &'a B,
}

impl<'a, B: Backend> DeleteEngine<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    pub async fn delete(&self, file_or_folder: &FileLocation, options: &DeleteOptions) -> Result<DeleteReport> {
        info!("Starting delete: {}", file_or_folder);

        let listing = self.backend.list(file_or_folder);
        let sizes = process_in_batches(listing, options.concurrency, move |file| self.delete_one(file, options)).await?;

        let report = DeleteReport {
            files_deleted: sizes.len() as u64,
            bytes_deleted: sizes.iter().sum(),
        };

        info!(
            "Delete finished: {} ({} files, {} bytes)",
            file_or_folder, report.files_deleted, report.bytes_deleted
        );

        Ok(report)
    }

    async fn delete_one(&self, file: ScannedFile, options: &DeleteOptions) -> Result<u64> {
        self.backend.delete_file(&file).await?;
        debug!("Deleted {}", file.location);

        if let Some(listener) = &options.listener {
            listener(&file);
        }

        Ok(file.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::LocalFileSystem;
    use crate::backend::memory::MemoryFileSystem;
    use crate::backend::test_support::CountingBackend;
    use crate::core::location::WriteRequest;
    use crate::core::options::WriteOptions;
    use futures::TryStreamExt;
    use std::sync::{Arc, Mutex};

    async fn put(fs: &impl Backend, location: &FileLocation, body: &str) {
        fs.write_file(WriteRequest::new(location.clone(), body.to_string()), &WriteOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_clears_subtree() {
        let fs = MemoryFileSystem::with_page_size(2);
        for key in ["a/1.txt", "a/2.txt", "a/x/3.txt", "a/x/y/4.txt", "b/5.txt"] {
            put(&fs, &FileLocation::object("bucket", key), "data").await;
        }

        let deleted = Arc::new(Mutex::new(Vec::new()));
        let seen = deleted.clone();
        let options = DeleteOptions::default().concurrency(3).listener(move |file| {
            seen.lock().unwrap().push(file.location.clone());
        });

        let engine = DeleteEngine::new(&fs);
        let report = engine.delete(&FileLocation::object("bucket", "a/"), &options).await.unwrap();

        assert_eq!(report, DeleteReport { files_deleted: 4, bytes_deleted: 16 });
        assert_eq!(deleted.lock().unwrap().len(), 4);

        let remaining: Vec<ScannedFile> = fs.list(&FileLocation::object("bucket", "a/")).try_collect().await.unwrap();
        assert!(remaining.is_empty());
        assert!(fs.scan(&FileLocation::object("bucket", "b/5.txt")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_single_file() {
        let fs = MemoryFileSystem::new();
        let file = FileLocation::object("bucket", "only.txt");
        put(&fs, &file, "x").await;

        let report = DeleteEngine::new(&fs).delete(&file, &DeleteOptions::default()).await.unwrap();

        assert_eq!(report.files_deleted, 1);
        assert!(fs.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_missing_folder_is_empty_report() {
        let fs = MemoryFileSystem::new();
        let report = DeleteEngine::new(&fs)
            .delete(&FileLocation::object("bucket", "gone/"), &DeleteOptions::default())
            .await
            .unwrap();

        assert_eq!(report, DeleteReport::default());
    }

    #[tokio::test]
    async fn test_delete_failure_stops_later_batches() {
        let fs = CountingBackend::new(MemoryFileSystem::new());
        for i in 0..6 {
            put(&fs, &FileLocation::object("bucket", format!("d/{}.txt", i)), "x").await;
        }
        fs.fail_on(&FileLocation::object("bucket", "d/0.txt"));

        let result = DeleteEngine::new(&fs)
            .delete(&FileLocation::object("bucket", "d/"), &DeleteOptions::default().concurrency(3))
            .await;

        assert!(result.is_err());
        assert_eq!(fs.deletes(), 2);
        assert_eq!(fs.inner().len().await, 4);
    }

    #[tokio::test]
    async fn test_delete_local_tree() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("tree");
        tokio::fs::create_dir_all(root.join("sub")).await.unwrap();
        tokio::fs::write(root.join("a.txt"), b"a").await.unwrap();
        tokio::fs::write(root.join("sub").join("b.txt"), b"bb").await.unwrap();

        let fs = LocalFileSystem::new();
        let report = DeleteEngine::new(&fs)
            .delete(&FileLocation::local(&root), &DeleteOptions::default())
            .await
            .unwrap();

        assert_eq!(report, DeleteReport { files_deleted: 2, bytes_deleted: 3 });
        assert!(!root.join("a.txt").exists());
        assert!(!root.join("sub").join("b.txt").exists());
    }
}
