//! Browser-based POST upload policies, signed with AWS Signature Version 4.
//!
//! The SDK signs requests the application itself sends; a form POST is sent
//! by the end client, so its policy document is built and signed here.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;

use crate::{Result, StorageError};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Static credentials a policy is signed with.
pub(crate) struct SigningCredentials<'a> {
	pub access_key_id: &'a str,
	pub secret_access_key: &'a str,
	pub session_token: Option<&'a str>,
}

/// Conditions an upload must satisfy to be accepted by the bucket.
pub(crate) struct PostPolicy<'a> {
	pub bucket: &'a str,
	pub key: &'a str,
	pub content_type: &'a str,
	pub max_content_length: Option<u64>,
	pub expires_in: Duration,
	pub region: &'a str,
}

impl PostPolicy<'_> {
	/// Sign the policy as of `now` and return the form fields, in the order
	/// the client must send them ahead of the file field.
	pub(crate) fn sign(
		&self,
		credentials: &SigningCredentials<'_>,
		now: DateTime<Utc>,
	) -> Result<Vec<(String, String)>> {
		let expires_in = TimeDelta::from_std(self.expires_in).map_err(|e| {
			StorageError::ConfigError(format!("url_expires_in out of range: {}", e))
		})?;
		let expiration = now + expires_in;

		let date = now.format("%Y%m%d").to_string();
		let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
		let credential = format!(
			"{}/{}/{}/{}/aws4_request",
			credentials.access_key_id, date, self.region, SERVICE
		);

		let mut conditions: Vec<Value> = vec![json!({ "Content-Type": self.content_type })];
		if let Some(max) = self.max_content_length {
			conditions.push(json!(["content-length-range", 0, max]));
		}
		conditions.push(json!({ "bucket": self.bucket }));
		conditions.push(json!({ "key": self.key }));
		conditions.push(json!({ "x-amz-algorithm": ALGORITHM }));
		conditions.push(json!({ "x-amz-credential": credential }));
		conditions.push(json!({ "x-amz-date": amz_date }));
		if let Some(token) = credentials.session_token {
			conditions.push(json!({ "x-amz-security-token": token }));
		}

		let document = json!({
			"expiration": expiration.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
			"conditions": conditions,
		});
		let policy = STANDARD.encode(document.to_string());

		let key = signing_key(credentials.secret_access_key, &date, self.region, SERVICE)?;
		let signature = hex::encode(hmac_sha256(&key, policy.as_bytes())?);

		let mut fields = vec![
			("Content-Type".to_string(), self.content_type.to_string()),
			("key".to_string(), self.key.to_string()),
			("x-amz-algorithm".to_string(), ALGORITHM.to_string()),
			("x-amz-credential".to_string(), credential),
			("x-amz-date".to_string(), amz_date),
		];
		if let Some(token) = credentials.session_token {
			fields.push(("x-amz-security-token".to_string(), token.to_string()));
		}
		fields.push(("policy".to_string(), policy));
		fields.push(("x-amz-signature".to_string(), signature));

		Ok(fields)
	}
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
	let mut mac = HmacSha256::new_from_slice(key)
		.map_err(|e| StorageError::ConfigError(format!("invalid signing key: {}", e)))?;
	mac.update(data);
	Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the SigV4 signing key for `date` (`YYYYMMDD`).
fn signing_key(
	secret_access_key: &str,
	date: &str,
	region: &str,
	service: &str,
) -> Result<Vec<u8>> {
	let k_date = hmac_sha256(format!("AWS4{}", secret_access_key).as_bytes(), date.as_bytes())?;
	let k_region = hmac_sha256(&k_date, region.as_bytes())?;
	let k_service = hmac_sha256(&k_region, service.as_bytes())?;
	hmac_sha256(&k_service, b"aws4_request")
}
