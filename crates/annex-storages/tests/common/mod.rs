//! Shared fixtures and assertions for storage backend tests.
//!
//! This module provides reusable fixtures for testing storage components.
//! All fixtures are designed to work with rstest and can be composed together.

#![allow(dead_code)]
#![allow(unreachable_pub)]

use annex_storages::backends::FileStorage;
use annex_storages::{
	FileConfig, FileDestination, FileSource, Result, StorageBackend, StorageError,
};
use rand::Rng;
use rstest::fixture;
use std::io::{Cursor, ErrorKind};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

// ============================================================================
// Test Data
// ============================================================================

/// Test file structure.
#[derive(Debug, Clone)]
pub struct TestFile {
	pub key: String,
	pub content: Vec<u8>,
}

impl TestFile {
	/// Create a new test file.
	pub fn new(key: impl Into<String>, content: Vec<u8>) -> Self {
		Self {
			key: key.into(),
			content,
		}
	}

	pub fn source(&self) -> FileSource {
		FileSource::bytes(self.content.clone())
	}
}

/// Generate random bytes of specified size.
pub fn generate_random_bytes(size: usize) -> Vec<u8> {
	let mut bytes = vec![0u8; size];
	rand::thread_rng().fill(&mut bytes[..]);
	bytes
}

/// Generate text content with specified number of lines.
pub fn generate_text_content(lines: usize) -> String {
	(0..lines)
		.map(|i| format!("Line {}: {}", i, "test content".repeat(10)))
		.collect::<Vec<_>>()
		.join("\n")
}

/// Generate unique key with prefix.
pub fn generate_unique_key(prefix: &str) -> String {
	format!("{}/{}.txt", prefix, uuid::Uuid::new_v4())
}

/// Small text file fixture.
#[fixture]
pub fn small_file() -> TestFile {
	TestFile::new("foo/small.txt", generate_text_content(10).into_bytes())
}

/// Binary file fixture with all byte values.
#[fixture]
pub fn binary_file() -> TestFile {
	TestFile::new("foo/binary.bin", (0u8..=255).collect())
}

/// Large random file fixture (256KB), bigger than any single read buffer.
#[fixture]
pub fn large_file() -> TestFile {
	TestFile::new("foo/large.bin", generate_random_bytes(256 * 1024))
}

// ============================================================================
// File Storage Fixtures
// ============================================================================

/// Temporary root directory with a file storage backend on top of it.
pub struct FileTestDir {
	temp_dir: TempDir,
	backend: Arc<dyn StorageBackend>,
}

impl FileTestDir {
	/// Create a new test directory with storage backend.
	pub fn new() -> Self {
		let temp_dir = TempDir::new().expect("Failed to create temp dir");
		let storage = FileStorage::new(FileConfig::new(temp_dir.path()))
			.expect("Failed to create file backend");

		Self {
			temp_dir,
			backend: Arc::new(storage),
		}
	}

	/// Get the storage backend.
	pub fn backend(&self) -> Arc<dyn StorageBackend> {
		Arc::clone(&self.backend)
	}

	/// Get the temp directory path.
	pub fn path(&self) -> &Path {
		self.temp_dir.path()
	}
}

/// File storage test directory fixture.
#[fixture]
pub fn file_dir() -> FileTestDir {
	FileTestDir::new()
}

// ============================================================================
// Helpers
// ============================================================================

/// Save every `(key, content)` pair.
pub async fn save_all(storage: &dyn StorageBackend, files: &[(&str, &[u8])]) {
	for (key, content) in files {
		storage
			.save_file(key, FileSource::bytes(content.to_vec()))
			.await
			.unwrap_or_else(|e| panic!("Failed to save {}: {}", key, e));
	}
}

/// Stream that fails on every read, like a client that went away.
pub struct BrokenStream;

impl AsyncRead for BrokenStream {
	fn poll_read(
		self: Pin<&mut Self>,
		_cx: &mut Context<'_>,
		_buf: &mut ReadBuf<'_>,
	) -> Poll<std::io::Result<()>> {
		Poll::Ready(Err(std::io::Error::new(
			ErrorKind::ConnectionReset,
			"client went away",
		)))
	}
}

/// Source yielding `head` and then failing.
pub fn interrupted_source(head: &[u8]) -> FileSource {
	FileSource::reader(Cursor::new(head.to_vec()).chain(BrokenStream))
}

/// Read an object fully into memory.
pub async fn read_back(storage: &dyn StorageBackend, key: &str) -> Result<Vec<u8>> {
	let mut content = Vec::new();
	storage
		.get_file(key, FileDestination::writer(&mut content))
		.await?;
	Ok(content)
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert that the object under `key` holds exactly `expected`.
pub async fn assert_content_matches(storage: &dyn StorageBackend, key: &str, expected: &[u8]) {
	let actual = read_back(storage, key)
		.await
		.unwrap_or_else(|e| panic!("Failed to read {}: {}", key, e));
	assert_eq!(actual.len(), expected.len(), "Content length mismatch for {}", key);
	assert!(actual == expected, "Content mismatch for {}", key);
}

/// Assert that listing `prefix` yields exactly `expected`, in any order.
pub async fn assert_keys(storage: &dyn StorageBackend, prefix: &str, expected: &[&str]) {
	let mut actual = storage
		.list_keys(prefix)
		.await
		.unwrap_or_else(|e| panic!("Failed to list {:?}: {}", prefix, e));
	actual.sort();

	let mut expected: Vec<String> = expected.iter().map(|k| k.to_string()).collect();
	expected.sort();

	assert_eq!(actual, expected, "Unexpected keys for prefix {:?}", prefix);
}

/// Assert that a result is a NotFound error.
pub fn assert_not_found<T: std::fmt::Debug>(result: Result<T>) {
	match result {
		Err(StorageError::NotFound(_)) => {}
		other => panic!("Expected NotFound error, got {:?}", other),
	}
}

/// Assert that a result is a ConfigError.
pub fn assert_config_error<T: std::fmt::Debug>(result: Result<T>) {
	match result {
		Err(StorageError::ConfigError(_)) => {}
		other => panic!("Expected ConfigError, got {:?}", other),
	}
}

/// Assert that a result is an InvalidKey error.
pub fn assert_invalid_key<T: std::fmt::Debug>(result: Result<T>) {
	match result {
		Err(StorageError::InvalidKey(_)) => {}
		other => panic!("Expected InvalidKey error, got {:?}", other),
	}
}

/// Assert that a result is an UnsupportedBackend error.
pub fn assert_unsupported_backend<T: std::fmt::Debug>(result: Result<T>) {
	match result {
		Err(StorageError::UnsupportedBackend(_)) => {}
		other => panic!("Expected UnsupportedBackend error, got {:?}", other),
	}
}
