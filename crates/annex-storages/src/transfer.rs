//! Sources and destinations for byte transfers.
//!
//! Callers pick the variant explicitly; backends never inspect argument types
//! at runtime.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxedAsyncRead = Pin<Box<dyn AsyncRead + Send>>;

/// Where the bytes of a `save_file` call come from.
pub enum FileSource {
	/// A file on the local filesystem.
	Path(PathBuf),
	/// A readable byte stream, consumed to its end.
	Reader(BoxedAsyncRead),
}

impl FileSource {
	pub fn path(path: impl Into<PathBuf>) -> Self {
		Self::Path(path.into())
	}

	pub fn reader(reader: impl AsyncRead + Send + 'static) -> Self {
		Self::Reader(Box::pin(reader))
	}

	/// In-memory content, streamed like any other reader.
	pub fn bytes(content: impl Into<Vec<u8>>) -> Self {
		Self::reader(Cursor::new(content.into()))
	}
}

impl fmt::Debug for FileSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
			Self::Reader(_) => f.write_str("Reader(..)"),
		}
	}
}

/// Where the bytes of a `get_file` call go.
pub enum FileDestination<'a> {
	/// A file on the local filesystem, created or truncated.
	Path(&'a Path),
	/// A writable byte sink. It is flushed but not shut down.
	Writer(&'a mut (dyn AsyncWrite + Unpin + Send)),
}

impl<'a> FileDestination<'a> {
	pub fn path(path: &'a Path) -> Self {
		Self::Path(path)
	}

	pub fn writer(writer: &'a mut (dyn AsyncWrite + Unpin + Send)) -> Self {
		Self::Writer(writer)
	}
}

impl fmt::Debug for FileDestination<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
			Self::Writer(_) => f.write_str("Writer(..)"),
		}
	}
}
