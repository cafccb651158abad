//! Storage backend implementations.

#[cfg(feature = "file")]
pub mod file;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "file")]
pub use file::FileStorage;

#[cfg(feature = "s3")]
pub use s3::S3Storage;
