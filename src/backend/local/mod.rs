pub mod file_ops;
pub mod filesystem;

pub use filesystem::{LocalFileSystem, LocalPathNormalizer, DEFAULT_POLL_PERIOD};
