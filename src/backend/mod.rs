pub mod local;
pub mod memory;
pub mod poly;
pub mod s3;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;
pub use poly::{NodeFileSystem, PolyFileSystem};
pub use s3::S3FileSystem;
pub use traits::{Backend, PathNormalizer};
