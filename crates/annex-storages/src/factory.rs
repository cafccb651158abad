//! Factory function for creating storage backends.

use crate::{Result, StorageBackend, StorageConfig};
use std::sync::Arc;

/// Create a storage backend from configuration.
///
/// This factory function creates the appropriate storage backend based on
/// the provided configuration.
///
/// # Arguments
///
/// * `config` - Storage configuration
///
/// # Returns
///
/// A shared trait object implementing `` `StorageBackend` ``.
///
/// # Examples
///
/// ```rust,no_run
/// use annex_storages::{create_storage, FileConfig, StorageConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = StorageConfig::File(FileConfig::new("/srv/uploads"));
///     let storage = create_storage(config).await?;
///     storage.delete("stale.txt").await?;
///     Ok(())
/// }
/// ```
pub async fn create_storage(config: StorageConfig) -> Result<Arc<dyn StorageBackend>> {
	match config {
		#[cfg(feature = "file")]
		StorageConfig::File(file_config) => {
			let storage = crate::backends::file::FileStorage::new(file_config)?;
			Ok(Arc::new(storage))
		}
		#[cfg(feature = "s3")]
		StorageConfig::S3(s3_config) => {
			let storage = crate::backends::s3::S3Storage::new(s3_config).await?;
			Ok(Arc::new(storage))
		}
	}
}
