use anyhow::{anyhow, Context, Result};
use async_stream::try_stream;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use opendal::{ErrorKind, Metadata, Operator};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::backend::traits::{Backend, PathNormalizer};
use crate::config::S3Config;
use crate::core::error::FileServiceError;
use crate::core::location::{mime_type_for, CopyOperation, FileLocation, ScannedFile, WriteRequest};
use crate::core::options::{CopyOptions, WriteOptions};

/// Re-applies object key normalization to object locations
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectKeyNormalizer;

impl PathNormalizer for ObjectKeyNormalizer {
    fn normalize(&self, location: &FileLocation) -> FileLocation {
        match location {
            FileLocation::Object { bucket, key } => FileLocation::object(bucket.clone(), key),
            other => other.clone(),
        }
    }
}

/// S3-compatible object store backend.
///
/// One opendal operator is built per bucket on first use and reused.
pub struct S3FileSystem {
    normalizer: ObjectKeyNormalizer,
    config: S3Config,
    operators: Mutex<HashMap<String, Operator>>,
}

impl S3FileSystem {
    pub fn new(config: S3Config) -> Self {
        Self {
            normalizer: ObjectKeyNormalizer,
            config,
            operators: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    fn operator(&self, bucket: &str) -> Result<Operator> {
        let mut operators = self.operators.lock()
            .map_err(|_| anyhow!("S3 operator cache lock poisoned"))?;

        if let Some(operator) = operators.get(bucket) {
            return Ok(operator.clone());
        }

        let operator = build_operator(&self.config, bucket)?;
        operators.insert(bucket.to_string(), operator.clone());
        Ok(operator)
    }

    /// Operator and key for an object location
    fn object_parts(&self, location: &FileLocation) -> Result<(Operator, String, FileLocation)> {
        match self.normalizer.normalize(location) {
            FileLocation::Object { bucket, key } => {
                let operator = self.operator(&bucket)?;
                let location = FileLocation::Object { bucket, key: key.clone() };
                Ok((operator, key, location))
            }
            other => Err(FileServiceError::unsupported("object store access", other.to_location_string()).into()),
        }
    }

    fn pages(&self, folder: FileLocation) -> impl Stream<Item=Result<ScannedFile>> + Send + '_ {
        try_stream! {
            let (operator, prefix, folder) = self.object_parts(&folder)?;

            let mut lister = operator
                .lister_with(&prefix)
                .recursive(true)
                .limit(self.config.page_size)
                .await
                .with_context(|| format!("Failed to list {}", folder))?;

            while let Some(entry) = lister.try_next().await? {
                // Folder markers
                if entry.path().ends_with('/') || entry.metadata().is_dir() {
                    continue;
                }

                let location = folder.with_key(entry.path());
                yield to_scanned_file(location, entry.metadata());
            }
        }
    }

    async fn write_chunked(&self, operator: &Operator, key: &str, request: WriteRequest, options: &WriteOptions) -> Result<()> {
        let part_size = self.config.upload_part_size.max(1);
        let total = request.body.len() as u64;
        let content_type = mime_type_for(key);

        debug!("Uploading {} bytes to {}", total, request.destination);

        let mut writer = operator
            .writer_with(key)
            .content_type(&content_type)
            .chunk(part_size)
            .await
            .with_context(|| format!("Failed to start upload to {}", request.destination))?;

        let mut loaded = 0usize;
        while loaded < request.body.len() {
            let end = (loaded + part_size).min(request.body.len());
            writer.write(request.body.slice(loaded..end)).await
                .with_context(|| format!("Failed to upload part of {}", request.destination))?;
            loaded = end;

            if let Some(progress) = &options.progress {
                progress(&request.destination, loaded as u64, total);
            }
        }

        writer.close().await
            .with_context(|| format!("Failed to complete upload to {}", request.destination))?;

        Ok(())
    }
}

impl Backend for S3FileSystem {
    async fn scan(&self, file: &FileLocation) -> Result<Option<ScannedFile>> {
        let (operator, key, location) = self.object_parts(file)?;

        match operator.stat(&key).await {
            Ok(metadata) if metadata.is_dir() => Ok(None),
            Ok(metadata) => Ok(Some(to_scanned_file(location, &metadata))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {}", location)),
        }
    }

    fn list(&self, file_or_folder: &FileLocation) -> BoxStream<'_, Result<ScannedFile>> {
        self.pages(file_or_folder.clone()).boxed()
    }

    async fn read_file(&self, file: &ScannedFile) -> Result<Bytes> {
        let (operator, key, location) = self.object_parts(&file.location)?;
        let buffer = operator.read(&key).await
            .with_context(|| format!("Failed to read {}", location))?;
        Ok(buffer.to_bytes())
    }

    async fn write_file(&self, request: WriteRequest, options: &WriteOptions) -> Result<()> {
        let (operator, key, _) = self.object_parts(&request.destination)?;
        self.write_chunked(&operator, &key, request, options).await
    }

    async fn delete_file(&self, file: &ScannedFile) -> Result<()> {
        let (operator, key, location) = self.object_parts(&file.location)?;
        debug!("Deleting object: {}", location);
        operator.delete(&key).await
            .with_context(|| format!("Failed to delete {}", location))
    }

    async fn wait_for_file_to_exist(&self, file: &FileLocation) -> Result<()> {
        let attempts = self.config.wait_max_attempts.max(1);
        let poll_period = Duration::from_millis(self.config.wait_poll_period_ms);

        for attempt in 1..=attempts {
            if self.scan(file).await?.is_some() {
                return Ok(());
            }
            if attempt < attempts {
                tokio::time::sleep(poll_period).await;
            }
        }

        Err(FileServiceError::WaitTimeout {
            location: self.to_location_string(file),
            attempts,
        }
        .into())
    }

    async fn copy_file(&self, operation: &CopyOperation, options: &CopyOptions) -> Result<()> {
        let (source_operator, source_key, source) = self.object_parts(&operation.source().location)?;
        let (destination_operator, destination_key, destination) = self.object_parts(operation.destination())?;

        if source.bucket() == destination.bucket() {
            debug!("Server-side copy: {} -> {}", source, destination);
            return source_operator.copy(&source_key, &destination_key).await
                .with_context(|| format!("Failed to copy {} to {}", source, destination));
        }

        // Copies between buckets go through this process
        let body = source_operator.read(&source_key).await
            .with_context(|| format!("Failed to read {}", source))?
            .to_bytes();
        let request = WriteRequest::new(destination, body);
        self.write_chunked(&destination_operator, &destination_key, request, &options.write_options()).await
    }

    fn to_location_string(&self, file: &FileLocation) -> String {
        self.normalizer.normalize(file).to_location_string()
    }

    async fn read_url(&self, file: &ScannedFile, expires: Duration) -> Result<String> {
        let (operator, key, location) = self.object_parts(&file.location)?;
        let request = operator.presign_read(&key, expires).await
            .with_context(|| format!("Failed to presign {}", location))?;
        Ok(request.uri().to_string())
    }
}

fn build_operator(config: &S3Config, bucket: &str) -> Result<Operator> {
    let mut builder = opendal::services::S3::default().bucket(bucket).root("/");

    if let Some(region) = &config.region {
        builder = builder.region(region);
    }
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(access_key_id) = &config.access_key_id {
        builder = builder.access_key_id(access_key_id);
    }
    if let Some(secret_access_key) = &config.secret_access_key {
        builder = builder.secret_access_key(secret_access_key);
    }

    let operator = Operator::new(builder)
        .with_context(|| format!("Failed to configure S3 client for bucket {}", bucket))?
        .finish();

    Ok(operator)
}

fn to_scanned_file(location: FileLocation, metadata: &Metadata) -> ScannedFile {
    let mime_type = metadata
        .content_type()
        .map(str::to_string)
        .unwrap_or_else(|| mime_type_for(&location.key()));

    ScannedFile {
        content_hash: etag_to_hash(metadata.etag()),
        size: metadata.content_length(),
        mime_type,
        location,
    }
}

/// Strip the quotes S3 puts around ETags
fn etag_to_hash(etag: Option<&str>) -> String {
    etag.map(|e| e.trim_matches('"').to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> S3Config {
        S3Config {
            region: Some("us-east-1".to_string()),
            endpoint: Some("http://127.0.0.1:9000".to_string()),
            access_key_id: Some("test".to_string()),
            secret_access_key: Some("test".to_string()),
            ..S3Config::default()
        }
    }

    #[test]
    fn test_etag_quotes_are_stripped() {
        assert_eq!(etag_to_hash(Some("\"0b26e313ed4a7ca6904b0e9369e5b957\"")), "0b26e313ed4a7ca6904b0e9369e5b957");
        assert_eq!(etag_to_hash(Some("abc-2")), "abc-2");
        assert_eq!(etag_to_hash(None), "");
    }

    #[test]
    fn test_operators_are_cached_per_bucket() {
        let fs = S3FileSystem::new(test_config());

        fs.operator("one").unwrap();
        fs.operator("one").unwrap();
        fs.operator("two").unwrap();

        assert_eq!(fs.operators.lock().unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_location_string_is_normalized() {
        let fs = S3FileSystem::new(test_config());
        let location = FileLocation::Object {
            bucket: "b".to_string(),
            key: "/dir/a\\b.txt".to_string(),
        };
        assert_eq!(fs.to_location_string(&location), "s3://b/dir/a\\b.txt");
    }

    #[tokio::test]
    async fn test_local_location_is_unsupported() {
        let fs = S3FileSystem::new(test_config());
        let err = fs.scan(&FileLocation::local("/tmp/x")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FileServiceError>(),
            Some(FileServiceError::Unsupported { .. })
        ));
    }
}
