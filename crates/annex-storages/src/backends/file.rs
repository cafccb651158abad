//! Local file system storage backend implementation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::FileConfig;
use crate::descriptor::{FileResponse, FileStream, UploadInfo, UploadOptions};
use crate::key;
use crate::transfer::{FileDestination, FileSource};
use crate::{Result, StorageBackend, StorageError};

/// Name prefix of in-progress writes; entries carrying it are never listed.
pub const TEMP_FILE_PREFIX: &str = ".annex-tmp-";

/// Local file system storage backend.
///
/// Keys map to files below `root_path`, one directory per key segment.
/// Directories are created on save and removed again once a delete leaves
/// them empty. Saves write a temporary sibling file and rename it over the
/// target, so a failed save leaves the previous content in place.
#[derive(Debug, Clone)]
pub struct FileStorage {
	root_path: PathBuf,
}

impl FileStorage {
	/// Create a new local storage backend.
	///
	/// The root directory is not required to exist yet; `save_file` fails
	/// with `` `StorageError::ConfigError` `` while it is missing.
	///
	/// # Errors
	///
	/// Returns `` `StorageError::ConfigError` `` if the root path is empty.
	pub fn new(config: FileConfig) -> Result<Self> {
		if config.root_path.as_os_str().is_empty() {
			return Err(StorageError::ConfigError(
				"file storage root_path must not be empty".to_string(),
			));
		}

		tracing::info!(root_path = %config.root_path.display(), "file storage configured");
		Ok(Self {
			root_path: config.root_path,
		})
	}

	pub fn root_path(&self) -> &Path {
		&self.root_path
	}

	/// Full path of the file stored under `key`.
	fn get_path(&self, name: &str) -> Result<PathBuf> {
		key::validate_key(name)?;
		if name.split('/').any(|segment| segment.starts_with(TEMP_FILE_PREFIX)) {
			return Err(StorageError::InvalidKey(format!(
				"{}: segments starting with {} are reserved",
				name, TEMP_FILE_PREFIX
			)));
		}
		Ok(self.join(name))
	}

	/// Join already validated segments onto the root.
	fn join(&self, relative: &str) -> PathBuf {
		let mut path = self.root_path.clone();
		for segment in relative.split('/').filter(|s| !s.is_empty()) {
			path.push(segment);
		}
		path
	}

	async fn ensure_root(&self) -> Result<()> {
		match fs::metadata(&self.root_path).await {
			Ok(metadata) if metadata.is_dir() => Ok(()),
			Ok(_) => Err(StorageError::ConfigError(format!(
				"Root path is not a directory: {}",
				self.root_path.display()
			))),
			Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::ConfigError(format!(
				"Root path does not exist: {}",
				self.root_path.display()
			))),
			Err(e) => Err(e.into()),
		}
	}

	/// Open the regular file stored under `name`, with its length.
	async fn open_existing(&self, name: &str) -> Result<(File, u64)> {
		let path = self.get_path(name)?;

		let metadata = match fs::metadata(&path).await {
			Ok(metadata) => metadata,
			Err(e) if is_missing(&e) => return Err(StorageError::NotFound(name.to_string())),
			Err(e) => return Err(e.into()),
		};
		if !metadata.is_file() {
			return Err(StorageError::NotFound(name.to_string()));
		}

		let file = File::open(&path).await.map_err(|e| {
			if is_missing(&e) {
				StorageError::NotFound(name.to_string())
			} else {
				e.into()
			}
		})?;

		Ok((file, metadata.len()))
	}

	/// Remove the now-empty directories above `name`, bottom-up.
	///
	/// Stops at the first directory that cannot be removed; failures never
	/// propagate.
	async fn remove_empty_parents(&self, name: &str) {
		let mut dir = key::parent(name);

		while !dir.is_empty() {
			if let Err(e) = fs::remove_dir(self.join(dir)).await {
				match e.kind() {
					ErrorKind::DirectoryNotEmpty | ErrorKind::NotFound => {}
					_ => tracing::warn!(
						directory = dir,
						error = %e,
						"failed to clean up directory after delete"
					),
				}
				break;
			}

			tracing::debug!(directory = dir, "removed empty directory");
			dir = key::parent(dir);
		}
	}

	/// Collect files under the directory `dir_key`.
	///
	/// Only entries of `dir_key` itself whose name starts with `name_filter`
	/// are considered; below that everything is collected.
	async fn collect_files(&self, dir_key: &str, name_filter: &str) -> Result<Vec<String>> {
		let mut keys = Vec::new();
		let mut pending = Vec::new();

		read_entries(self.join(dir_key), dir_key, name_filter, &mut keys, &mut pending).await?;
		while let Some((path, sub_key)) = pending.pop() {
			read_entries(path, &sub_key, "", &mut keys, &mut pending).await?;
		}

		Ok(keys)
	}
}

fn is_missing(e: &std::io::Error) -> bool {
	matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

async fn names_directory(path: &Path) -> bool {
	fs::metadata(path).await.is_ok_and(|metadata| metadata.is_dir())
}

/// Write `source` to the fresh file `temp_path`, then move it onto `path`.
async fn write_and_replace(temp_path: &Path, path: &Path, source: FileSource) -> Result<()> {
	match source {
		FileSource::Path(in_path) => {
			fs::copy(&in_path, temp_path).await?;
		}
		FileSource::Reader(mut reader) => {
			let mut out = File::create_new(temp_path).await?;
			tokio::io::copy(&mut reader, &mut out).await?;
			out.flush().await?;
			out.sync_all().await?;
		}
	}

	fs::rename(temp_path, path).await?;
	Ok(())
}

fn join_key(dir_key: &str, name: &str) -> String {
	if dir_key.is_empty() {
		name.to_string()
	} else {
		format!("{}/{}", dir_key, name)
	}
}

async fn read_entries(
	path: PathBuf,
	dir_key: &str,
	name_filter: &str,
	keys: &mut Vec<String>,
	pending: &mut Vec<(PathBuf, String)>,
) -> Result<()> {
	let mut entries = match fs::read_dir(&path).await {
		Ok(entries) => entries,
		// Vanished or never existed: nothing to list.
		Err(e) if is_missing(&e) => return Ok(()),
		Err(e) => return Err(e.into()),
	};

	while let Some(entry) = entries.next_entry().await? {
		let file_name = entry.file_name();
		// Names that are not valid UTF-8 cannot have been stored as keys.
		let Some(name) = file_name.to_str() else {
			continue;
		};
		if !name.starts_with(name_filter) || name.starts_with(TEMP_FILE_PREFIX) {
			continue;
		}

		let file_type = entry.file_type().await?;
		if file_type.is_dir() {
			pending.push((entry.path(), join_key(dir_key, name)));
		} else if file_type.is_file() {
			keys.push(join_key(dir_key, name));
		}
	}

	Ok(())
}

#[async_trait]
impl StorageBackend for FileStorage {
	async fn delete(&self, name: &str) -> Result<()> {
		let path = self.get_path(name)?;

		match fs::remove_file(&path).await {
			Ok(()) => tracing::debug!(key = name, "deleted file"),
			Err(e) if is_missing(&e) => tracing::debug!(key = name, "file already absent"),
			// A directory is never a stored key.
			Err(e) => {
				if !names_directory(&path).await {
					return Err(e.into());
				}
				tracing::debug!(key = name, "key names a directory, nothing to delete");
			}
		}

		self.remove_empty_parents(name).await;
		Ok(())
	}

	async fn delete_many(&self, keys: &[String]) -> Result<()> {
		let mut failed = Vec::new();

		for name in keys {
			if let Err(e) = self.delete(name).await {
				tracing::warn!(key = %name, error = %e, "failed to delete file");
				failed.push(name.clone());
			}
		}

		if failed.is_empty() {
			Ok(())
		} else {
			Err(StorageError::DeleteFailed(failed))
		}
	}

	async fn get_file(&self, name: &str, destination: FileDestination<'_>) -> Result<()> {
		let (mut file, _) = self.open_existing(name).await?;

		match destination {
			FileDestination::Path(out_path) => {
				let mut out = File::create(out_path).await?;
				tokio::io::copy(&mut file, &mut out).await?;
				out.flush().await?;
			}
			FileDestination::Writer(writer) => {
				tokio::io::copy(&mut file, writer).await?;
				writer.flush().await?;
			}
		}

		Ok(())
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
		key::validate_prefix(prefix)?;

		if !prefix.is_empty()
			&& !prefix.ends_with('/')
			&& let Ok(metadata) = fs::metadata(self.join(prefix)).await
			&& metadata.is_file()
		{
			return Ok(vec![prefix.to_string()]);
		}

		let keys = match prefix.strip_suffix('/') {
			Some(dir_key) => self.collect_files(dir_key, "").await?,
			None => {
				self.collect_files(key::parent(prefix), key::file_name(prefix))
					.await?
			}
		};

		tracing::debug!(prefix, count = keys.len(), "listed files");
		Ok(keys)
	}

	async fn save_file(&self, name: &str, source: FileSource) -> Result<()> {
		let path = self.get_path(name)?;
		self.ensure_root().await?;

		// Keys always have at least one segment below the root.
		let parent = path.parent().unwrap_or(&self.root_path);
		fs::create_dir_all(parent).await?;

		let temp_path = parent.join(format!("{}{}", TEMP_FILE_PREFIX, Uuid::new_v4()));
		if let Err(e) = write_and_replace(&temp_path, &path, source).await {
			if let Err(cleanup) = fs::remove_file(&temp_path).await
				&& !is_missing(&cleanup)
			{
				tracing::warn!(
					path = %temp_path.display(),
					error = %cleanup,
					"failed to remove temporary file"
				);
			}
			// Directories created for a first save must not outlive it.
			self.remove_empty_parents(name).await;
			return Err(e);
		}

		tracing::debug!(key = name, "saved file");
		Ok(())
	}

	async fn send_file(&self, name: &str) -> Result<FileResponse> {
		let (file, content_length) = self.open_existing(name).await?;

		Ok(FileResponse::Stream(FileStream {
			file_name: key::file_name(name).to_string(),
			content_type: key::content_type(name),
			content_length,
			body: Box::pin(file),
		}))
	}

	async fn get_upload_info(&self, _name: &str, _options: UploadOptions) -> Result<UploadInfo> {
		Err(StorageError::Unsupported(
			"file storage has no delegated upload; route uploads through the application"
				.to_string(),
		))
	}
}
