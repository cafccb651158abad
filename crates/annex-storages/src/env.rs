//! Namespaced configuration from environment-style key/value pairs.
//!
//! A variable `<NAMESPACE>_<OPTION>` becomes the option `<option>`: the
//! namespace prefix is stripped and the remainder lower-cased.

use std::collections::BTreeMap;

/// Option name (lower-cased) to raw string value.
pub type ConfigSet = BTreeMap<String, String>;

/// Collect the options under `namespace` from the process environment.
///
/// # Examples
///
/// ```rust,no_run
/// use annex_storages::env::config_from_env;
///
/// // With FLASK_ANNEX_STORAGE=file set in the environment:
/// let options = config_from_env("FLASK_ANNEX");
/// assert_eq!(options.get("storage").map(String::as_str), Some("file"));
/// ```
pub fn config_from_env(namespace: &str) -> ConfigSet {
	config_from_vars(namespace, std::env::vars())
}

/// Collect the options under `namespace` from an arbitrary set of variables.
pub fn config_from_vars<I, K, V>(namespace: &str, vars: I) -> ConfigSet
where
	I: IntoIterator<Item = (K, V)>,
	K: AsRef<str>,
	V: Into<String>,
{
	let prefix = format!("{}_", namespace);

	vars.into_iter()
		.filter_map(|(key, value)| {
			let option = key.as_ref().strip_prefix(&prefix)?;
			if option.is_empty() {
				return None;
			}
			Some((option.to_lowercase(), value.into()))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;

	#[test]
	fn test_strips_prefix_and_lowercases() {
		let options = config_from_vars(
			"FLASK_ANNEX_S3",
			[
				("FLASK_ANNEX_S3_BUCKET_NAME", "uploads"),
				("FLASK_ANNEX_S3_REGION", "us-east-1"),
				("FLASK_ANNEX_STORAGE", "s3"),
				("OTHER_VAR", "ignored"),
			],
		);

		assert_eq!(options.len(), 2);
		assert_eq!(options["bucket_name"], "uploads");
		assert_eq!(options["region"], "us-east-1");
	}

	#[test]
	fn test_requires_separator_after_namespace() {
		let options = config_from_vars(
			"APP",
			[("APPLICATION_NAME", "x"), ("APP_", "empty"), ("APP_STORAGE", "file")],
		);

		assert_eq!(options.len(), 1);
		assert_eq!(options["storage"], "file");
	}

	#[test]
	#[serial]
	fn test_reads_process_environment() {
		// SAFETY: Setting environment variables is unsafe in multi-threaded programs.
		// This test uses #[serial] to ensure exclusive access to environment variables.
		unsafe {
			std::env::set_var("ANNEX_ENV_TEST_ROOT_PATH", "/srv/files");
		}

		let options = config_from_env("ANNEX_ENV_TEST");
		assert_eq!(options.get("root_path").map(String::as_str), Some("/srv/files"));

		// SAFETY: see above.
		unsafe {
			std::env::remove_var("ANNEX_ENV_TEST_ROOT_PATH");
		}
	}
}
