use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Buffer size for streaming copy (1MB)
const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Create the parent directory of `path` if it is missing
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

pub async fn write_file(path: &Path, body: &[u8]) -> Result<()> {
    debug!("Writing file: {:?} ({} bytes)", path, body.len());

    ensure_parent_dir(path).await?;

    let mut file = tokio::fs::File::create(path).await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(body).await
        .context("Failed to write file body")?;

    file.sync_all().await
        .context("Failed to sync written file")?;

    Ok(())
}

pub async fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    debug!("Copying file: {:?} -> {:?}", src, dst);

    ensure_parent_dir(dst).await?;

    let mut src_file = tokio::fs::File::open(src).await
        .context("Failed to open source file")?;

    let mut dst_file = tokio::fs::File::create(dst).await
        .context("Failed to create destination file")?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = src_file.read(&mut buffer).await
            .context("Failed to read from source")?;

        if bytes_read == 0 {
            break;
        }

        dst_file.write_all(&buffer[..bytes_read]).await
            .context("Failed to write to destination")?;

        total_bytes += bytes_read as u64;
    }

    // Sync destination file
    dst_file.sync_all().await
        .context("Failed to sync destination file")?;

    copy_metadata(src, dst).await?;

    Ok(total_bytes)
}

/// Carry the modification time over to the copy
async fn copy_metadata(src: &Path, dst: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(src).await?;

    if let Ok(modified) = metadata.modified() {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(dst)?;

        file.set_modified(modified)?;
    }

    Ok(())
}
