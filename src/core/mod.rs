pub mod batch;
pub mod copy_engine;
pub mod delete_engine;
pub mod error;
pub mod location;
pub mod options;
pub mod path;
pub mod scanner;
pub mod service;
pub mod validation;

pub use copy_engine::{CopyEngine, CopyReport};
pub use delete_engine::{DeleteEngine, DeleteReport};
pub use error::FileServiceError;
pub use location::{CopyOperation, FileLocation, ScannedFile, WriteRequest};
pub use options::{CopyOptions, DeleteOptions, WriteOptions};
pub use service::FileService;
pub use validation::validate_job;
