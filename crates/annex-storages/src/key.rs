//! Key validation and key-derived metadata.
//!
//! A key is a slash-delimited relative path. Every segment must be non-empty
//! and must not be `.` or `..`, so a key can never address anything outside
//! the backend's root (directory) or namespace (bucket).

use crate::{Result, StorageError};

/// Content type used when the key's extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Validate a key naming a single object.
pub fn validate_key(key: &str) -> Result<()> {
	if key.is_empty() || key.ends_with('/') {
		return Err(StorageError::InvalidKey(key.to_string()));
	}

	validate_segments(key)
}

/// Validate a listing prefix.
///
/// Unlike [`validate_key`], the empty prefix (everything) and a trailing
/// slash are accepted.
pub fn validate_prefix(prefix: &str) -> Result<()> {
	let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
	if trimmed.is_empty() {
		return if prefix.is_empty() {
			Ok(())
		} else {
			Err(StorageError::InvalidKey(prefix.to_string()))
		};
	}

	validate_segments(trimmed)
}

fn validate_segments(key: &str) -> Result<()> {
	let invalid = key
		.split('/')
		.any(|segment| {
			segment.is_empty() || segment == "." || segment == ".." || segment.contains('\0')
		});

	if invalid {
		return Err(StorageError::InvalidKey(key.to_string()));
	}

	Ok(())
}

/// Final path segment of a key, used as the download file name.
pub fn file_name(key: &str) -> &str {
	key.rsplit('/').next().unwrap_or(key)
}

/// Directory part of a key, without the trailing slash (`""` at top level).
pub fn parent(key: &str) -> &str {
	key.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Guess the content type of an object from its key's extension.
pub fn content_type(key: &str) -> String {
	mime_guess::from_path(file_name(key))
		.first_raw()
		.unwrap_or(DEFAULT_CONTENT_TYPE)
		.to_string()
}
