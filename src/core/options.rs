use std::fmt;
use std::sync::Arc;

use super::location::{CopyOperation, FileLocation, ScannedFile};

/// Default number of in-flight operations per batch
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Called once per completed copy
pub type CopyListener = Arc<dyn Fn(&CopyOperation) + Send + Sync>;

/// Called once per deleted file
pub type DeleteListener = Arc<dyn Fn(&ScannedFile) + Send + Sync>;

/// Upload progress: destination, bytes sent so far, total bytes
pub type ProgressListener = Arc<dyn Fn(&FileLocation, u64, u64) + Send + Sync>;

/// Options for single-file writes
#[derive(Clone, Default)]
pub struct WriteOptions {
    /// Replace an existing destination
    pub overwrite: bool,
    pub progress: Option<ProgressListener>,
}

impl WriteOptions {
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn progress<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FileLocation, u64, u64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(listener));
        self
    }
}

/// Options for recursive copies
#[derive(Clone)]
pub struct CopyOptions {
    /// Operations admitted per batch
    pub concurrency: usize,
    /// Replace existing destination files
    pub overwrite: bool,
    /// Leave identical destination files alone even when overwriting
    pub skip_same: bool,
    pub listener: Option<CopyListener>,
    pub progress: Option<ProgressListener>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            overwrite: false,
            skip_same: true,
            listener: None,
            progress: None,
        }
    }
}

impl CopyOptions {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn skip_same(mut self, skip_same: bool) -> Self {
        self.skip_same = skip_same;
        self
    }

    pub fn listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&CopyOperation) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn progress<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FileLocation, u64, u64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(listener));
        self
    }

    /// Destination files are replaced without looking at them first
    pub fn always_overwrites(&self) -> bool {
        self.overwrite && !self.skip_same
    }

    /// Write options used when a copy crosses backends
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            overwrite: self.overwrite,
            progress: self.progress.clone(),
        }
    }
}

/// Options for recursive deletes
#[derive(Clone)]
pub struct DeleteOptions {
    pub concurrency: usize,
    pub listener: Option<DeleteListener>,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            listener: None,
        }
    }
}

impl DeleteOptions {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ScannedFile) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }
}

impl fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOptions")
            .field("overwrite", &self.overwrite)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl fmt::Debug for CopyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyOptions")
            .field("concurrency", &self.concurrency)
            .field("overwrite", &self.overwrite)
            .field("skip_same", &self.skip_same)
            .field("listener", &self.listener.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl fmt::Debug for DeleteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteOptions")
            .field("concurrency", &self.concurrency)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}
