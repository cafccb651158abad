//! Configuration types for storage backends.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "file")]
use std::path::PathBuf;

#[cfg(feature = "s3")]
use std::time::Duration;

use crate::env::ConfigSet;
use crate::{Result, StorageError};

/// Default lifetime of presigned URLs and upload policies, in seconds.
#[cfg(feature = "s3")]
pub const DEFAULT_URL_EXPIRES_IN: u64 = 300;

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
	/// Local file system
	File,
	/// Amazon S3 or a compatible object store
	S3,
}

impl BackendType {
	/// Canonical lower-case discriminator.
	pub fn as_str(&self) -> &'static str {
		match self {
			BackendType::File => "file",
			BackendType::S3 => "s3",
		}
	}

	/// Namespace holding this backend's options under `namespace`,
	/// e.g. `FLASK_ANNEX` becomes `FLASK_ANNEX_S3`.
	pub fn env_namespace(&self, namespace: &str) -> String {
		format!("{}_{}", namespace, self.as_str().to_uppercase())
	}
}

impl fmt::Display for BackendType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BackendType {
	type Err = StorageError;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"file" | "local" => Ok(BackendType::File),
			"s3" => Ok(BackendType::S3),
			_ => Err(StorageError::UnsupportedBackend(s.to_string())),
		}
	}
}

/// Configuration for the local file system backend.
#[cfg(feature = "file")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
	/// Directory under which every key is stored
	pub root_path: PathBuf,
}

#[cfg(feature = "file")]
impl FileConfig {
	pub fn new(root_path: impl Into<PathBuf>) -> Self {
		Self {
			root_path: root_path.into(),
		}
	}

	fn from_options(options: &ConfigSet) -> Result<Self> {
		reject_unknown(BackendType::File, options, &["root_path"])?;

		let root_path = required(BackendType::File, options, "root_path")?;
		if root_path.is_empty() {
			return Err(StorageError::ConfigError(
				"file storage root_path must not be empty".to_string(),
			));
		}

		Ok(Self::new(root_path))
	}
}

/// Configuration for the S3 backend.
#[cfg(feature = "s3")]
#[derive(Clone, PartialEq, Eq)]
pub struct S3Config {
	/// S3 bucket name
	pub bucket_name: String,
	/// AWS region (e.g., "us-east-1"); the ambient chain decides when unset
	pub region: Option<String>,
	/// Static access key id; the ambient credential chain is used when unset
	pub access_key_id: Option<String>,
	/// Static secret access key, required together with `access_key_id`
	pub secret_access_key: Option<String>,
	/// Session token accompanying temporary static credentials
	pub session_token: Option<String>,
	/// Custom endpoint URL (for LocalStack or MinIO), implies path-style addressing
	pub endpoint_url: Option<String>,
	/// Lifetime of presigned URLs and upload policies
	pub url_expires_in: Duration,
	/// Backend-level default upload size limit, in bytes
	pub max_content_length: Option<u64>,
}

#[cfg(feature = "s3")]
impl fmt::Debug for S3Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("S3Config")
			.field("bucket_name", &self.bucket_name)
			.field("region", &self.region)
			.field("access_key_id", &self.access_key_id)
			.field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
			.field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
			.field("endpoint_url", &self.endpoint_url)
			.field("url_expires_in", &self.url_expires_in)
			.field("max_content_length", &self.max_content_length)
			.finish()
	}
}

#[cfg(feature = "s3")]
impl S3Config {
	const OPTIONS: &'static [&'static str] = &[
		"bucket_name",
		"region",
		"access_key_id",
		"secret_access_key",
		"session_token",
		"endpoint_url",
		"url_expires_in",
		"max_content_length",
	];

	pub fn new(bucket_name: impl Into<String>) -> Self {
		Self {
			bucket_name: bucket_name.into(),
			region: None,
			access_key_id: None,
			secret_access_key: None,
			session_token: None,
			endpoint_url: None,
			url_expires_in: Duration::from_secs(DEFAULT_URL_EXPIRES_IN),
			max_content_length: None,
		}
	}

	pub fn with_region(mut self, region: impl Into<String>) -> Self {
		self.region = Some(region.into());
		self
	}

	pub fn with_credentials(
		mut self,
		access_key_id: impl Into<String>,
		secret_access_key: impl Into<String>,
	) -> Self {
		self.access_key_id = Some(access_key_id.into());
		self.secret_access_key = Some(secret_access_key.into());
		self
	}

	pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
		self.session_token = Some(session_token.into());
		self
	}

	pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
		self.endpoint_url = Some(endpoint_url.into().trim_end_matches('/').to_string());
		self
	}

	pub fn with_url_expires_in(mut self, url_expires_in: Duration) -> Self {
		self.url_expires_in = url_expires_in;
		self
	}

	pub fn with_max_content_length(mut self, max_content_length: u64) -> Self {
		self.max_content_length = Some(max_content_length);
		self
	}

	/// Check the invariants a usable configuration must hold.
	pub fn validate(&self) -> Result<()> {
		if self.bucket_name.is_empty() {
			return Err(StorageError::ConfigError(
				"s3 storage bucket_name must not be empty".to_string(),
			));
		}

		if self.access_key_id.is_some() != self.secret_access_key.is_some() {
			return Err(StorageError::ConfigError(
				"s3 storage access_key_id and secret_access_key must be set together".to_string(),
			));
		}

		if self.session_token.is_some() && self.access_key_id.is_none() {
			return Err(StorageError::ConfigError(
				"s3 storage session_token requires static credentials".to_string(),
			));
		}

		Ok(())
	}

	fn from_options(options: &ConfigSet) -> Result<Self> {
		reject_unknown(BackendType::S3, options, Self::OPTIONS)?;

		let mut config = Self::new(required(BackendType::S3, options, "bucket_name")?);
		config.region = options.get("region").cloned();
		config.access_key_id = options.get("access_key_id").cloned();
		config.secret_access_key = options.get("secret_access_key").cloned();
		config.session_token = options.get("session_token").cloned();

		if let Some(endpoint_url) = options.get("endpoint_url") {
			config = config.with_endpoint_url(endpoint_url.as_str());
		}
		if let Some(secs) = parse_u64(options, "url_expires_in")? {
			config.url_expires_in = Duration::from_secs(secs);
		}
		config.max_content_length = parse_u64(options, "max_content_length")?;

		config.validate()?;
		Ok(config)
	}
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
	#[cfg(feature = "file")]
	File(FileConfig),
	#[cfg(feature = "s3")]
	S3(S3Config),
}

impl StorageConfig {
	/// Build the configuration for `backend` from string options, as produced
	/// by [`config_from_env`](crate::env::config_from_env).
	///
	/// Unknown option names are rejected so that a stale option can never be
	/// silently ignored.
	#[allow(unused_variables)]
	pub fn from_options(backend: BackendType, options: &ConfigSet) -> Result<Self> {
		match backend {
			#[cfg(feature = "file")]
			BackendType::File => Ok(StorageConfig::File(FileConfig::from_options(options)?)),
			#[cfg(feature = "s3")]
			BackendType::S3 => Ok(StorageConfig::S3(S3Config::from_options(options)?)),
			#[allow(unreachable_patterns)]
			_ => Err(StorageError::UnsupportedBackend(format!(
				"{} (backend not enabled)",
				backend
			))),
		}
	}

	/// Load the configuration for `backend` from `<NAMESPACE>_<OPTION>`
	/// environment variables.
	///
	/// # Environment Variables
	///
	/// ## File Backend
	/// - `<NAMESPACE>_ROOT_PATH`: Root directory (required)
	///
	/// ## S3 Backend
	/// - `<NAMESPACE>_BUCKET_NAME`: Bucket name (required)
	/// - `<NAMESPACE>_REGION`: AWS region (optional)
	/// - `<NAMESPACE>_ACCESS_KEY_ID` / `<NAMESPACE>_SECRET_ACCESS_KEY`: Static credentials
	///   (optional)
	/// - `<NAMESPACE>_SESSION_TOKEN`: Session token for static credentials (optional)
	/// - `<NAMESPACE>_ENDPOINT_URL`: Custom endpoint URL (optional)
	/// - `<NAMESPACE>_URL_EXPIRES_IN`: Presigned URL lifetime in seconds (optional, default 300)
	/// - `<NAMESPACE>_MAX_CONTENT_LENGTH`: Default upload size limit in bytes (optional)
	pub fn from_env(backend: BackendType, namespace: &str) -> Result<Self> {
		Self::from_options(backend, &crate::env::config_from_env(namespace))
	}

	pub fn backend_type(&self) -> BackendType {
		match self {
			#[cfg(feature = "file")]
			StorageConfig::File(_) => BackendType::File,
			#[cfg(feature = "s3")]
			StorageConfig::S3(_) => BackendType::S3,
		}
	}
}

fn required(backend: BackendType, options: &ConfigSet, name: &str) -> Result<String> {
	options.get(name).cloned().ok_or_else(|| {
		StorageError::ConfigError(format!("{} storage requires the {} option", backend, name))
	})
}

fn reject_unknown(backend: BackendType, options: &ConfigSet, known: &[&str]) -> Result<()> {
	let unknown: Vec<&str> = options
		.keys()
		.map(String::as_str)
		.filter(|name| !known.contains(name))
		.collect();

	if unknown.is_empty() {
		Ok(())
	} else {
		Err(StorageError::ConfigError(format!(
			"unrecognized {} storage option(s): {}",
			backend,
			unknown.join(", ")
		)))
	}
}

/// Parse an optional non-negative integer option.
pub(crate) fn parse_u64(options: &ConfigSet, name: &str) -> Result<Option<u64>> {
	options
		.get(name)
		.map(|value| {
			value.trim().parse::<u64>().map_err(|_| {
				StorageError::ConfigError(format!(
					"option {} must be a non-negative integer, got {:?}",
					name, value
				))
			})
		})
		.transpose()
}
