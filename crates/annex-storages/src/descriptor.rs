//! Values describing how a client performs a transfer.
//!
//! [`FileResponse`] is what `send_file` hands to the web layer, and
//! [`UploadInfo`] is the JSON-serializable upload descriptor returned by
//! `get_upload_info`.

use std::collections::BTreeMap;
use std::fmt;

use http::header::{self, HeaderMap, HeaderValue};
use http::StatusCode;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

use crate::transfer::BoxedAsyncRead;

/// Characters left unescaped in an RFC 5987 `filename*` value.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'!')
	.remove(b'#')
	.remove(b'$')
	.remove(b'&')
	.remove(b'+')
	.remove(b'-')
	.remove(b'.')
	.remove(b'^')
	.remove(b'_')
	.remove(b'`')
	.remove(b'|')
	.remove(b'~');

/// Build an `attachment` Content-Disposition value for `file_name`.
///
/// Names that are not plain printable ASCII get an ASCII fallback plus an
/// RFC 5987 `filename*` parameter.
pub fn content_disposition(file_name: &str) -> String {
	let ascii: String = file_name
		.chars()
		.map(|c| match c {
			'"' | '\\' => '_',
			c if c.is_ascii() && !c.is_ascii_control() => c,
			_ => '_',
		})
		.collect();

	if ascii == file_name {
		format!("attachment; filename=\"{}\"", ascii)
	} else {
		format!(
			"attachment; filename=\"{}\"; filename*=UTF-8''{}",
			ascii,
			utf8_percent_encode(file_name, ATTR_CHAR)
		)
	}
}

/// A file streamed through the application.
pub struct FileStream {
	pub file_name: String,
	pub content_type: String,
	pub content_length: u64,
	pub body: BoxedAsyncRead,
}

impl fmt::Debug for FileStream {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FileStream")
			.field("file_name", &self.file_name)
			.field("content_type", &self.content_type)
			.field("content_length", &self.content_length)
			.finish_non_exhaustive()
	}
}

/// How the application should deliver an object to an end client.
///
/// Both variants signal the object as an attachment named after the key's
/// final segment.
#[derive(Debug)]
pub enum FileResponse {
	/// Serve the bytes directly.
	Stream(FileStream),
	/// Redirect the client to a time-limited URL.
	Redirect { url: String },
}

impl FileResponse {
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Stream(_) => StatusCode::OK,
			Self::Redirect { .. } => StatusCode::FOUND,
		}
	}

	/// Response headers the web layer should send along with [`status`](Self::status).
	pub fn headers(&self) -> HeaderMap {
		let mut headers = HeaderMap::new();

		match self {
			Self::Stream(stream) => {
				if let Ok(value) = HeaderValue::from_str(&stream.content_type) {
					headers.insert(header::CONTENT_TYPE, value);
				}
				headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stream.content_length));
				if let Ok(value) = HeaderValue::from_str(&content_disposition(&stream.file_name)) {
					headers.insert(header::CONTENT_DISPOSITION, value);
				}
			}
			Self::Redirect { url } => {
				if let Ok(value) = HeaderValue::from_str(url) {
					headers.insert(header::LOCATION, value);
				}
			}
		}

		headers
	}

	pub fn redirect_url(&self) -> Option<&str> {
		match self {
			Self::Redirect { url } => Some(url),
			Self::Stream(_) => None,
		}
	}

	pub fn into_stream(self) -> Option<FileStream> {
		match self {
			Self::Stream(stream) => Some(stream),
			Self::Redirect { .. } => None,
		}
	}
}

/// HTTP method a client uses for a direct upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadMethod {
	Put,
	Post,
}

/// Descriptor for a direct client upload.
///
/// Serializes to `{ "method", "url", "post_data"?, "headers"? }`. The order
/// of `post_data` is significant: a POST policy signature covers the fields
/// in exactly this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadInfo {
	pub method: UploadMethod,
	pub url: String,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub post_data: Vec<(String, String)>,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub headers: BTreeMap<String, Option<String>>,
}

impl UploadInfo {
	/// A browser form POST to `url` carrying `post_data` before the file field.
	pub fn post(url: impl Into<String>, post_data: Vec<(String, String)>) -> Self {
		Self {
			method: UploadMethod::Post,
			url: url.into(),
			post_data,
			headers: BTreeMap::new(),
		}
	}

	/// A PUT back to the application's own file route, for backends without
	/// delegated upload.
	///
	/// `authorization` is the caller's `Authorization` header, forwarded as-is
	/// (serialized as `null` when absent).
	pub fn put_fallback(url: impl Into<String>, authorization: Option<String>) -> Self {
		let mut headers = BTreeMap::new();
		headers.insert("Authorization".to_string(), authorization);

		Self {
			method: UploadMethod::Put,
			url: url.into(),
			post_data: Vec::new(),
			headers,
		}
	}

	/// Value of a `post_data` field, if present.
	pub fn field(&self, name: &str) -> Option<&str> {
		self.post_data
			.iter()
			.find(|(field, _)| field == name)
			.map(|(_, value)| value.as_str())
	}
}

/// Per-call options for `get_upload_info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
	/// Explicit maximum upload size, overriding every default.
	pub max_content_length: Option<u64>,
	/// Application-wide default, consulted after the backend's own default.
	pub default_max_content_length: Option<u64>,
}

impl UploadOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_max_content_length(mut self, max_content_length: u64) -> Self {
		self.max_content_length = Some(max_content_length);
		self
	}

	pub fn with_default_max_content_length(mut self, max_content_length: Option<u64>) -> Self {
		self.default_max_content_length = max_content_length;
		self
	}

	/// Resolve the effective limit: explicit override, then `instance_default`,
	/// then the application-wide default, else unbounded.
	pub fn resolve_max_content_length(&self, instance_default: Option<u64>) -> Option<u64> {
		self.max_content_length
			.or(instance_default)
			.or(self.default_max_content_length)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_content_disposition_ascii() {
		assert_eq!(content_disposition("baz.json"), "attachment; filename=\"baz.json\"");
	}

	#[test]
	fn test_content_disposition_non_ascii() {
		assert_eq!(
			content_disposition("ファイル.txt"),
			"attachment; filename=\"____.txt\"; filename*=UTF-8''%E3%83%95%E3%82%A1%E3%82%A4%E3%83%AB.txt"
		);
	}

	#[test]
	fn test_content_disposition_escapes_quotes() {
		assert_eq!(
			content_disposition("a\"b.txt"),
			"attachment; filename=\"a_b.txt\"; filename*=UTF-8''a%22b.txt"
		);
	}

	#[test]
	fn test_redirect_response() {
		let response = FileResponse::Redirect {
			url: "https://bucket.example.com/foo/baz.json?X-Amz-Signature=abc".to_string(),
		};

		assert_eq!(response.status(), StatusCode::FOUND);
		assert_eq!(
			response.headers().get(header::LOCATION).unwrap(),
			"https://bucket.example.com/foo/baz.json?X-Amz-Signature=abc"
		);
		assert!(response.into_stream().is_none());
	}

	#[test]
	fn test_stream_response_headers() {
		let response = FileResponse::Stream(FileStream {
			file_name: "baz.json".to_string(),
			content_type: "application/json".to_string(),
			content_length: 2,
			body: Box::pin(std::io::Cursor::new(b"2\n".to_vec())),
		});

		let headers = response.headers();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
		assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "2");
		assert_eq!(
			headers.get(header::CONTENT_DISPOSITION).unwrap(),
			"attachment; filename=\"baz.json\""
		);
	}

	#[test]
	fn test_put_fallback_wire_shape() {
		let info = UploadInfo::put_fallback("http://localhost/files/foo/qux.txt", None);
		assert_eq!(
			serde_json::to_value(&info).unwrap(),
			json!({
				"method": "PUT",
				"url": "http://localhost/files/foo/qux.txt",
				"headers": { "Authorization": null },
			})
		);

		let info = UploadInfo::put_fallback(
			"http://localhost/files/foo/qux.txt",
			Some("Bearer foo".to_string()),
		);
		assert_eq!(
			serde_json::to_value(&info).unwrap()["headers"],
			json!({ "Authorization": "Bearer foo" })
		);
	}

	#[test]
	fn test_post_wire_shape_keeps_field_order() {
		let info = UploadInfo::post(
			"https://bucket.s3.us-east-1.amazonaws.com/",
			vec![
				("Content-Type".to_string(), "text/plain".to_string()),
				("key".to_string(), "a/b.txt".to_string()),
				("policy".to_string(), "eyJ9".to_string()),
			],
		);

		assert_eq!(
			serde_json::to_string(&info).unwrap(),
			r#"{"method":"POST","url":"https://bucket.s3.us-east-1.amazonaws.com/","post_data":[["Content-Type","text/plain"],["key","a/b.txt"],["policy","eyJ9"]]}"#
		);
		assert_eq!(info.field("key"), Some("a/b.txt"));
		assert_eq!(info.field("missing"), None);
	}

	#[test]
	fn test_max_content_length_precedence() {
		let ambient = UploadOptions::new().with_default_max_content_length(Some(300));

		assert_eq!(
			ambient
				.with_max_content_length(100)
				.resolve_max_content_length(Some(200)),
			Some(100)
		);
		assert_eq!(ambient.resolve_max_content_length(Some(200)), Some(200));
		assert_eq!(ambient.resolve_max_content_length(None), Some(300));
		assert_eq!(UploadOptions::new().resolve_max_content_length(None), None);
	}
}
