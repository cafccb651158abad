//! Amazon S3 storage backend implementation.

mod post;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use chrono::Utc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::config::S3Config;
use crate::descriptor::{FileResponse, UploadInfo, UploadOptions, content_disposition};
use crate::key;
use crate::transfer::{FileDestination, FileSource};
use crate::{Result, StorageBackend, StorageError};

use post::{PostPolicy, SigningCredentials};

/// Region used when neither the configuration nor the ambient chain names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Maximum number of keys accepted by a single DeleteObjects request.
const DELETE_BATCH_SIZE: usize = 1000;

/// Size of each part when a stream is uploaded in several requests.
///
/// Streams shorter than one part go out as a single PutObject. S3 requires
/// every part but the last to be at least 5 MiB.
pub const MULTIPART_PART_SIZE: usize = 8 * 1024 * 1024;

/// Amazon S3 storage backend.
///
/// Works against AWS itself or any S3-compatible endpoint (LocalStack,
/// MinIO). Downloads are delegated to presigned URLs and uploads to signed
/// POST policies, so object bytes never pass through the application
/// unless `get_file` or `save_file` is called.
#[derive(Debug, Clone)]
pub struct S3Storage {
	client: Client,
	bucket: String,
	region: String,
	endpoint_url: Option<String>,
	credentials: Option<SharedCredentialsProvider>,
	url_expires_in: Duration,
	max_content_length: Option<u64>,
}

impl S3Storage {
	/// Create a new S3 storage backend.
	///
	/// Static credentials from the configuration take precedence over the
	/// ambient AWS credential chain. No request is sent to S3 here.
	pub async fn new(config: S3Config) -> Result<Self> {
		config.validate()?;

		let mut loader = aws_config::defaults(BehaviorVersion::latest());
		if let Some(region) = &config.region {
			loader = loader.region(Region::new(region.clone()));
		}
		if let (Some(access_key_id), Some(secret_access_key)) =
			(&config.access_key_id, &config.secret_access_key)
		{
			loader = loader.credentials_provider(Credentials::new(
				access_key_id.clone(),
				secret_access_key.clone(),
				config.session_token.clone(),
				None,
				"annex",
			));
		}
		let sdk_config = loader.load().await;

		let region = match sdk_config.region() {
			Some(region) => region.to_string(),
			None => {
				tracing::warn!(
					default = DEFAULT_REGION,
					"no AWS region configured, falling back to default"
				);
				DEFAULT_REGION.to_string()
			}
		};

		let mut builder =
			aws_sdk_s3::config::Builder::from(&sdk_config).region(Region::new(region.clone()));
		if let Some(endpoint_url) = &config.endpoint_url {
			builder = builder.endpoint_url(endpoint_url).force_path_style(true);
		}
		let client = Client::from_conf(builder.build());

		tracing::info!(
			bucket = %config.bucket_name,
			region = %region,
			endpoint_url = ?config.endpoint_url,
			"s3 storage configured"
		);

		Ok(Self {
			client,
			bucket: config.bucket_name,
			region,
			endpoint_url: config.endpoint_url,
			credentials: sdk_config.credentials_provider(),
			url_expires_in: config.url_expires_in,
			max_content_length: config.max_content_length,
		})
	}

	pub fn bucket(&self) -> &str {
		&self.bucket
	}

	pub fn region(&self) -> &str {
		&self.region
	}

	/// The underlying SDK client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Form action for browser POST uploads.
	fn upload_url(&self) -> String {
		match &self.endpoint_url {
			Some(endpoint_url) => format!("{}/{}", endpoint_url, self.bucket),
			None => format!("https://{}.s3.{}.amazonaws.com/", self.bucket, self.region),
		}
	}

	/// Delete one DeleteObjects batch, returning the keys S3 reported as failed.
	async fn delete_batch(&self, keys: &[&String]) -> Result<Vec<String>> {
		let objects = keys
			.iter()
			.map(|name| ObjectIdentifier::builder().key(name.as_str()).build())
			.collect::<std::result::Result<Vec<_>, _>>()
			.map_err(|e| StorageError::backend("failed to build delete request", e))?;

		let delete = Delete::builder()
			.set_objects(Some(objects))
			.quiet(true)
			.build()
			.map_err(|e| StorageError::backend("failed to build delete request", e))?;

		let output = self
			.client
			.delete_objects()
			.bucket(&self.bucket)
			.delete(delete)
			.send()
			.await
			.map_err(|e| StorageError::backend("failed to delete objects", e))?;

		Ok(output
			.errors()
			.iter()
			.map(|error| {
				tracing::warn!(
					key = ?error.key(),
					code = ?error.code(),
					message = ?error.message(),
					"s3 refused to delete object"
				);
				error.key().unwrap_or_default().to_string()
			})
			.collect())
	}

	async fn put_object(&self, name: &str, body: ByteStream) -> Result<()> {
		self.client
			.put_object()
			.bucket(&self.bucket)
			.key(name)
			.content_type(key::content_type(name))
			.body(body)
			.send()
			.await
			.map_err(|e| StorageError::backend(format!("failed to put object {}", name), e))?;
		Ok(())
	}

	/// Upload a stream of at least one full part as a multipart upload.
	///
	/// The upload is aborted on any failure so no parts are left behind.
	async fn put_multipart(
		&self,
		name: &str,
		first_part: Vec<u8>,
		reader: &mut (impl AsyncRead + Unpin + Send),
	) -> Result<()> {
		let upload = self
			.client
			.create_multipart_upload()
			.bucket(&self.bucket)
			.key(name)
			.content_type(key::content_type(name))
			.send()
			.await
			.map_err(|e| {
				StorageError::backend(format!("failed to start multipart upload {}", name), e)
			})?;
		let upload_id = upload.upload_id().ok_or_else(|| {
			StorageError::backend(
				format!("failed to start multipart upload {}", name),
				"no upload id in response",
			)
		})?;

		let result = self.upload_parts(name, upload_id, first_part, reader).await;
		if result.is_err()
			&& let Err(e) = self
				.client
				.abort_multipart_upload()
				.bucket(&self.bucket)
				.key(name)
				.upload_id(upload_id)
				.send()
				.await
		{
			tracing::warn!(
				bucket = %self.bucket,
				key = name,
				error = %e,
				"failed to abort multipart upload"
			);
		}
		result
	}

	async fn upload_parts(
		&self,
		name: &str,
		upload_id: &str,
		first_part: Vec<u8>,
		reader: &mut (impl AsyncRead + Unpin + Send),
	) -> Result<()> {
		let mut parts = Vec::new();
		let mut content = first_part;

		while !content.is_empty() {
			let part_number = i32::try_from(parts.len() + 1).map_err(|_| {
				StorageError::backend(
					format!("too many parts for {}", name),
					"part number overflow",
				)
			})?;
			let output = self
				.client
				.upload_part()
				.bucket(&self.bucket)
				.key(name)
				.upload_id(upload_id)
				.part_number(part_number)
				.body(ByteStream::from(content))
				.send()
				.await
				.map_err(|e| {
					StorageError::backend(format!("failed to upload part of {}", name), e)
				})?;

			parts.push(
				CompletedPart::builder()
					.set_e_tag(output.e_tag().map(str::to_string))
					.part_number(part_number)
					.build(),
			);
			content = read_part(reader).await?;
		}

		tracing::debug!(bucket = %self.bucket, key = name, parts = parts.len(), "uploaded parts");
		self.client
			.complete_multipart_upload()
			.bucket(&self.bucket)
			.key(name)
			.upload_id(upload_id)
			.multipart_upload(
				CompletedMultipartUpload::builder()
					.set_parts(Some(parts))
					.build(),
			)
			.send()
			.await
			.map_err(|e| {
				StorageError::backend(format!("failed to complete multipart upload {}", name), e)
			})?;
		Ok(())
	}
}

#[async_trait]
impl StorageBackend for S3Storage {
	async fn delete(&self, name: &str) -> Result<()> {
		key::validate_key(name)?;

		self.client
			.delete_object()
			.bucket(&self.bucket)
			.key(name)
			.send()
			.await
			.map_err(|e| StorageError::backend(format!("failed to delete object {}", name), e))?;

		tracing::debug!(bucket = %self.bucket, key = name, "deleted object");
		Ok(())
	}

	async fn delete_many(&self, keys: &[String]) -> Result<()> {
		if keys.is_empty() {
			return Ok(());
		}

		let (valid, invalid): (Vec<&String>, Vec<&String>) =
			keys.iter().partition(|name| key::validate_key(name).is_ok());
		let mut failed: Vec<String> = invalid.into_iter().cloned().collect();

		for batch in valid.chunks(DELETE_BATCH_SIZE) {
			match self.delete_batch(batch).await {
				Ok(refused) => failed.extend(refused),
				Err(e) => {
					tracing::warn!(
						bucket = %self.bucket,
						count = batch.len(),
						error = %e,
						"delete batch failed"
					);
					failed.extend(batch.iter().map(|name| name.to_string()));
				}
			}
		}

		if failed.is_empty() {
			tracing::debug!(bucket = %self.bucket, count = keys.len(), "deleted objects");
			Ok(())
		} else {
			Err(StorageError::DeleteFailed(failed))
		}
	}

	async fn get_file(&self, name: &str, destination: FileDestination<'_>) -> Result<()> {
		key::validate_key(name)?;

		let output = self
			.client
			.get_object()
			.bucket(&self.bucket)
			.key(name)
			.send()
			.await
			.map_err(|e| {
				let e = e.into_service_error();
				if e.is_no_such_key() {
					StorageError::NotFound(name.to_string())
				} else {
					StorageError::backend(format!("failed to get object {}", name), e)
				}
			})?;

		let body = output.body.into_async_read();
		tokio::pin!(body);

		match destination {
			FileDestination::Path(out_path) => {
				let mut out = File::create(out_path).await?;
				tokio::io::copy(&mut body, &mut out).await?;
				out.flush().await?;
			}
			FileDestination::Writer(writer) => {
				tokio::io::copy(&mut body, writer).await?;
				writer.flush().await?;
			}
		}

		Ok(())
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
		key::validate_prefix(prefix)?;

		let mut keys = Vec::new();
		let mut continuation_token: Option<String> = None;

		loop {
			let output = self
				.client
				.list_objects_v2()
				.bucket(&self.bucket)
				.set_prefix((!prefix.is_empty()).then(|| prefix.to_string()))
				.set_continuation_token(continuation_token.take())
				.send()
				.await
				.map_err(|e| StorageError::backend("failed to list objects", e))?;

			keys.extend(
				output
					.contents()
					.iter()
					.filter_map(|object| object.key())
					// Folder markers and foreign names are not addressable keys.
					.filter(|name| key::validate_key(name).is_ok())
					.map(str::to_string),
			);

			match output.next_continuation_token() {
				Some(token) if output.is_truncated().unwrap_or(false) => {
					continuation_token = Some(token.to_string());
				}
				_ => break,
			}
		}

		tracing::debug!(bucket = %self.bucket, prefix, count = keys.len(), "listed objects");
		Ok(keys)
	}

	async fn save_file(&self, name: &str, source: FileSource) -> Result<()> {
		key::validate_key(name)?;

		match source {
			FileSource::Path(in_path) => {
				self.put_object(name, byte_stream_from_path(&in_path).await?).await?;
			}
			FileSource::Reader(mut reader) => {
				let first_part = read_part(&mut reader).await?;
				if first_part.len() < MULTIPART_PART_SIZE {
					self.put_object(name, ByteStream::from(first_part)).await?;
				} else {
					self.put_multipart(name, first_part, &mut reader).await?;
				}
			}
		}

		tracing::debug!(bucket = %self.bucket, key = name, "saved object");
		Ok(())
	}

	async fn send_file(&self, name: &str) -> Result<FileResponse> {
		key::validate_key(name)?;

		let presigning = PresigningConfig::expires_in(self.url_expires_in)
			.map_err(|e| StorageError::ConfigError(format!("invalid url_expires_in: {}", e)))?;

		let request = self
			.client
			.get_object()
			.bucket(&self.bucket)
			.key(name)
			.response_content_disposition(content_disposition(key::file_name(name)))
			.presigned(presigning)
			.await
			.map_err(|e| StorageError::backend(format!("failed to presign object {}", name), e))?;

		Ok(FileResponse::Redirect {
			url: request.uri().to_string(),
		})
	}

	async fn get_upload_info(&self, name: &str, options: UploadOptions) -> Result<UploadInfo> {
		key::validate_key(name)?;

		let provider = self.credentials.as_ref().ok_or_else(|| {
			StorageError::ConfigError("no AWS credentials available to sign uploads".to_string())
		})?;
		let credentials = provider
			.provide_credentials()
			.await
			.map_err(|e| StorageError::backend("failed to resolve AWS credentials", e))?;

		let content_type = key::content_type(name);
		let policy = PostPolicy {
			bucket: &self.bucket,
			key: name,
			content_type: &content_type,
			max_content_length: options.resolve_max_content_length(self.max_content_length),
			expires_in: self.url_expires_in,
			region: &self.region,
		};
		let fields = policy.sign(
			&SigningCredentials {
				access_key_id: credentials.access_key_id(),
				secret_access_key: credentials.secret_access_key(),
				session_token: credentials.session_token(),
			},
			Utc::now(),
		)?;

		Ok(UploadInfo::post(self.upload_url(), fields))
	}
}

/// Read up to one multipart part from `reader`; empty once it is drained.
async fn read_part(reader: &mut (impl AsyncRead + Unpin)) -> Result<Vec<u8>> {
	let mut part = Vec::new();
	reader
		.take(MULTIPART_PART_SIZE as u64)
		.read_to_end(&mut part)
		.await?;
	Ok(part)
}

async fn byte_stream_from_path(path: &Path) -> Result<ByteStream> {
	// Surface a missing source as an IO error rather than an SDK one.
	tokio::fs::metadata(path).await?;

	ByteStream::from_path(path)
		.await
		.map_err(|e| StorageError::backend(format!("failed to read {}", path.display()), e))
}
