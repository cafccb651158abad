//! Error types shared by every storage backend.

use std::error::Error as StdError;

/// Boxed error used to carry transport failures from backend SDKs.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by storage backends and the [`Annex`](crate::Annex) facade.
///
/// `Io` and `Backend` together form the "backend failure" class: they wrap
/// whatever the filesystem or the remote object API reported and are never
/// retried by this crate.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	/// The key does not name a stored object.
	#[error("Object not found: {0}")]
	NotFound(String),

	/// The operation has no meaning for the active backend.
	#[error("Unsupported operation: {0}")]
	Unsupported(String),

	/// The backend cannot be constructed or used as configured.
	#[error("Configuration error: {0}")]
	ConfigError(String),

	/// The key is malformed or would escape the storage root.
	#[error("Invalid key: {0:?}")]
	InvalidKey(String),

	/// The storage discriminator does not name a known backend.
	#[error("Unsupported storage backend: {0}")]
	UnsupportedBackend(String),

	/// A batch delete ran to completion but some keys could not be removed.
	#[error("Failed to delete {} key(s): {}", .0.len(), .0.join(", "))]
	DeleteFailed(Vec<String>),

	/// Operating-system level failure.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// Transport or SDK failure reported by a remote backend.
	#[error("Backend failure: {message}")]
	Backend {
		message: String,
		#[source]
		source: BoxError,
	},
}

impl StorageError {
	/// Wrap a transport error with a short description of what was attempted.
	pub fn backend(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
		Self::Backend {
			message: message.into(),
			source: source.into(),
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound(_))
	}

	pub fn is_unsupported(&self) -> bool {
		matches!(self, Self::Unsupported(_))
	}

	/// Whether this error wraps an underlying OS or transport failure.
	pub fn is_backend_failure(&self) -> bool {
		matches!(self, Self::Io(_) | Self::Backend { .. })
	}
}
