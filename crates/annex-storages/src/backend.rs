//! Storage backend trait definition.

use async_trait::async_trait;

use crate::Result;
use crate::descriptor::{FileResponse, UploadInfo, UploadOptions};
use crate::transfer::{FileDestination, FileSource};

/// Storage backend trait for uniform blob storage operations.
///
/// Every backend (local file system, S3) implements the same semantics:
///
/// - keys are slash-delimited relative paths (see [`crate::key`]);
/// - deleting an absent key succeeds;
/// - saving an existing key replaces it (last write wins);
/// - listing never surfaces anything but stored keys.
///
/// # Examples
///
/// ```rust,no_run
/// use annex_storages::{FileDestination, FileSource, Result, StorageBackend};
///
/// async fn example(storage: &dyn StorageBackend) -> Result<()> {
///     storage.save_file("foo/bar.txt", FileSource::bytes(b"1\n".to_vec())).await?;
///
///     let mut content = Vec::new();
///     storage.get_file("foo/bar.txt", FileDestination::writer(&mut content)).await?;
///     assert_eq!(content, b"1\n");
///
///     for key in storage.list_keys("foo/").await? {
///         println!("{}", key);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
	/// Delete an object.
	///
	/// Succeeds when the key does not exist.
	async fn delete(&self, key: &str) -> Result<()>;

	/// Delete a batch of objects.
	///
	/// An empty batch is a no-op. The batch is not atomic: every key is
	/// attempted, and keys that could not be removed are reported together
	/// as `` `StorageError::DeleteFailed` ``.
	async fn delete_many(&self, keys: &[String]) -> Result<()>;

	/// Copy an object's bytes to `destination`.
	///
	/// # Errors
	///
	/// Returns `` `StorageError::NotFound` `` if the key doesn't exist.
	async fn get_file(&self, key: &str, destination: FileDestination<'_>) -> Result<()>;

	/// List the keys starting with `prefix`.
	///
	/// An empty prefix lists everything. The order is backend-defined.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

	/// Store the bytes of `source` under `key`, replacing any existing object.
	async fn save_file(&self, key: &str, source: FileSource) -> Result<()>;

	/// Describe how to deliver the object to an end client as an attachment.
	async fn send_file(&self, key: &str) -> Result<FileResponse>;

	/// Describe how a client can upload `key` directly to the backend.
	///
	/// # Errors
	///
	/// Returns `` `StorageError::Unsupported` `` when the backend has no
	/// delegated upload mechanism; callers route the upload through the
	/// application instead.
	async fn get_upload_info(&self, key: &str, options: UploadOptions) -> Result<UploadInfo>;
}
