use thiserror::Error;

/// Typed failures raised through `anyhow`.
///
/// A missing file is never one of these: lookups report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum FileServiceError {
    #[error("{operation} is not supported for {location}")]
    Unsupported {
        operation: &'static str,
        location: String,
    },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("{location} did not appear after {attempts} attempts")]
    WaitTimeout { location: String, attempts: u32 },
}

impl FileServiceError {
    pub fn unsupported(operation: &'static str, location: impl Into<String>) -> Self {
        FileServiceError::Unsupported {
            operation,
            location: location.into(),
        }
    }
}
