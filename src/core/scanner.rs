use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Buffer size for streaming hashes (1MB)
const SCAN_BUFFER_SIZE: usize = 1024 * 1024;

/// Content fingerprint of a blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    /// Lowercase hex MD5, comparable with single-part S3 ETags
    pub md5: String,
    pub size: u64,
}

/// Computes content fingerprints for backends that don't store one
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentScanner;

impl ContentScanner {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint an in-memory body
    pub fn scan(&self, body: &[u8]) -> ContentInfo {
        ContentInfo {
            md5: format!("{:x}", md5::compute(body)),
            size: body.len() as u64,
        }
    }

    /// Fingerprint a reader without buffering it whole
    pub async fn scan_reader<R>(&self, mut reader: R) -> Result<ContentInfo>
    where
        R: AsyncRead + Unpin,
    {
        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; SCAN_BUFFER_SIZE];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader.read(&mut buffer).await
                .context("Failed to read content for hashing")?;

            if bytes_read == 0 {
                break;
            }

            context.consume(&buffer[..bytes_read]);
            total_bytes += bytes_read as u64;
        }

        Ok(ContentInfo {
            md5: format!("{:x}", context.compute()),
            size: total_bytes,
        })
    }

    pub async fn scan_file(&self, path: &Path) -> Result<ContentInfo> {
        let file = tokio::fs::File::open(path).await
            .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
        self.scan_reader(file).await
    }
}
