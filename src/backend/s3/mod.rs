pub mod filesystem;

pub use filesystem::{ObjectKeyNormalizer, S3FileSystem};
