//! # annex-storages
//!
//! Uniform blob storage for web applications.
//!
//! This crate provides one interface, [`StorageBackend`], over a local
//! directory tree and over Amazon S3 (or any S3-compatible store). Both
//! backends honour the same contract: idempotent deletes, last-write-wins
//! saves, string-prefix listing, and descriptors that let a client download
//! or upload directly without routing bytes through the application where
//! the backend allows it.
//!
//! ## Features
//!
//! - **Unified API**: Single `` `StorageBackend` `` trait for every backend
//! - **Async I/O**: All operations are asynchronous using Tokio
//! - **Feature Flags**: `file` and `s3`, both enabled by default
//! - **Delegated transfers**: Presigned download URLs and signed POST upload forms
//! - **Environment configuration**: `<NAMESPACE>_STORAGE` plus `<NAMESPACE>_<BACKEND>_<OPTION>`
//!
//! ## Example
//!
//! ```rust,no_run
//! use annex_storages::{Annex, FileDestination, FileSource, StorageBackend, UploadOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load configuration from environment
//!     let annex = Annex::from_env("FLASK_ANNEX").await?;
//!
//!     // Save a file
//!     annex.save_file("foo/bar.txt", FileSource::bytes(b"Hello, world!".to_vec())).await?;
//!
//!     // Read it back
//!     let mut content = Vec::new();
//!     annex.get_file("foo/bar.txt", FileDestination::writer(&mut content)).await?;
//!
//!     // Ask how a browser should upload the next one
//!     let info = annex
//!         .upload_info_or_put("foo/qux.txt", UploadOptions::new(), "/files/foo/qux.txt", None)
//!         .await?;
//!     println!("{}", serde_json::to_string(&info)?);
//!
//!     Ok(())
//! }
//! ```

pub mod annex;
pub mod backend;
pub mod backends;
pub mod config;
pub mod descriptor;
pub mod env;
pub mod error;
pub mod factory;
pub mod key;
pub mod transfer;

pub use annex::Annex;
pub use backend::StorageBackend;
#[cfg(feature = "file")]
pub use config::FileConfig;
#[cfg(feature = "s3")]
pub use config::S3Config;
pub use config::{BackendType, StorageConfig};
pub use descriptor::{FileResponse, FileStream, UploadInfo, UploadMethod, UploadOptions};
pub use env::ConfigSet;
pub use error::{Result, StorageError};
pub use factory::create_storage;
pub use transfer::{FileDestination, FileSource};
