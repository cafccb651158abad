//! The `Annex` facade: one configured backend behind the storage interface.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendType, StorageConfig, parse_u64};
use crate::descriptor::{FileResponse, UploadInfo, UploadOptions};
use crate::env::{ConfigSet, config_from_vars};
use crate::factory::create_storage;
use crate::transfer::{FileDestination, FileSource};
use crate::{Result, StorageBackend, StorageError};

/// A storage facade owning exactly one backend for its lifetime.
///
/// Only the [`StorageBackend`] capabilities are reachable through it, so
/// application code cannot couple itself to one backend's extra surface.
///
/// # Examples
///
/// ```rust,no_run
/// use annex_storages::{Annex, FileSource, StorageBackend};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     // FLASK_ANNEX_STORAGE=file
///     // FLASK_ANNEX_FILE_ROOT_PATH=/srv/uploads
///     let annex = Annex::from_env("FLASK_ANNEX").await?;
///
///     annex.save_file("foo/bar.txt", FileSource::bytes(b"1\n".to_vec())).await?;
///     let keys = annex.list_keys("foo/").await?;
///     assert_eq!(keys, ["foo/bar.txt"]);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Annex {
	storage: Arc<dyn StorageBackend>,
	backend_type: BackendType,
	max_content_length: Option<u64>,
}

impl fmt::Debug for Annex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Annex")
			.field("backend_type", &self.backend_type)
			.field("max_content_length", &self.max_content_length)
			.finish_non_exhaustive()
	}
}

impl Annex {
	/// Construct the backend named by `storage` from its string options.
	///
	/// # Errors
	///
	/// `` `StorageError::UnsupportedBackend` `` for an unknown discriminator,
	/// `` `StorageError::ConfigError` `` for missing or unknown options.
	pub async fn new(storage: &str, options: &ConfigSet) -> Result<Self> {
		let backend: BackendType = storage.parse()?;
		Self::from_config(StorageConfig::from_options(backend, options)?).await
	}

	/// Construct the backend described by a typed configuration.
	pub async fn from_config(config: StorageConfig) -> Result<Self> {
		let backend_type = config.backend_type();
		let storage = create_storage(config).await?;

		tracing::debug!(backend = %backend_type, "annex initialized");
		Ok(Self {
			storage,
			backend_type,
			max_content_length: None,
		})
	}

	/// Construct from `<NAMESPACE>_*` environment variables.
	///
	/// # Environment Variables
	///
	/// - `<NAMESPACE>_STORAGE`: Backend discriminator, `file` or `s3` (required)
	/// - `<NAMESPACE>_MAX_CONTENT_LENGTH`: Application-wide upload size default (optional)
	/// - `<NAMESPACE>_<BACKEND>_<OPTION>`: Backend options, e.g. `FLASK_ANNEX_S3_BUCKET_NAME`
	///
	/// `<BACKEND>` is the canonical tag. When `<NAMESPACE>_STORAGE` names an
	/// alias such as `local`, options under the alias (`<NAMESPACE>_LOCAL_*`)
	/// are read as well and win over the canonical ones.
	pub async fn from_env(namespace: &str) -> Result<Self> {
		Self::from_vars(namespace, std::env::vars()).await
	}

	/// Same as [`from_env`](Self::from_env), over an explicit set of variables.
	pub async fn from_vars<I>(namespace: &str, vars: I) -> Result<Self>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		let vars: Vec<(String, String)> = vars.into_iter().collect();
		let borrowed = || vars.iter().map(|(k, v)| (k.as_str(), v.as_str()));

		let settings = config_from_vars(namespace, borrowed());
		let storage = settings.get("storage").ok_or_else(|| {
			StorageError::ConfigError(format!("{}_STORAGE is not set", namespace))
		})?;
		let backend: BackendType = storage.parse()?;
		let max_content_length = parse_u64(&settings, "max_content_length")?;

		// Options come only from the backend's own namespace.
		let canonical = backend.env_namespace(namespace);
		let mut options = config_from_vars(&canonical, borrowed());
		let written = format!("{}_{}", namespace, storage.to_uppercase());
		if written != canonical {
			options.extend(config_from_vars(&written, borrowed()));
		}
		let annex = Self::from_config(StorageConfig::from_options(backend, &options)?).await?;

		Ok(Self {
			max_content_length,
			..annex
		})
	}

	/// Set the application-wide default upload size limit.
	pub fn with_max_content_length(mut self, max_content_length: u64) -> Self {
		self.max_content_length = Some(max_content_length);
		self
	}

	pub fn backend_type(&self) -> BackendType {
		self.backend_type
	}

	pub fn max_content_length(&self) -> Option<u64> {
		self.max_content_length
	}

	/// Upload descriptor for `key`, falling back to a PUT to `self_url` when
	/// the backend has no delegated upload.
	///
	/// `authorization` is the caller's `Authorization` header, forwarded so the
	/// client can authenticate the PUT the same way.
	pub async fn upload_info_or_put(
		&self,
		key: &str,
		options: UploadOptions,
		self_url: &str,
		authorization: Option<String>,
	) -> Result<UploadInfo> {
		match self.get_upload_info(key, options).await {
			Err(StorageError::Unsupported(reason)) => {
				tracing::debug!(
					key,
					reason = %reason,
					"falling back to upload through the application"
				);
				Ok(UploadInfo::put_fallback(self_url, authorization))
			}
			result => result,
		}
	}
}

#[async_trait]
impl StorageBackend for Annex {
	async fn delete(&self, key: &str) -> Result<()> {
		self.storage.delete(key).await
	}

	async fn delete_many(&self, keys: &[String]) -> Result<()> {
		self.storage.delete_many(keys).await
	}

	async fn get_file(&self, key: &str, destination: FileDestination<'_>) -> Result<()> {
		self.storage.get_file(key, destination).await
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
		self.storage.list_keys(prefix).await
	}

	async fn save_file(&self, key: &str, source: FileSource) -> Result<()> {
		self.storage.save_file(key, source).await
	}

	async fn send_file(&self, key: &str) -> Result<FileResponse> {
		self.storage.send_file(key).await
	}

	async fn get_upload_info(&self, key: &str, options: UploadOptions) -> Result<UploadInfo> {
		let options = match options.default_max_content_length {
			Some(_) => options,
			None => options.with_default_max_content_length(self.max_content_length),
		};
		self.storage.get_upload_info(key, options).await
	}
}
