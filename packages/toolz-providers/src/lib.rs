pub mod opinion;
pub mod prompt;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

use toolz_config::ProviderDialect;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub fn auth_headers(
	dialect: ProviderDialect,
	api_key: &str,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	match dialect {
		ProviderDialect::OpenAi => {
			headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
		},
		ProviderDialect::Anthropic => {
			headers.insert(HeaderName::from_static("x-api-key"), api_key.parse()?);
			headers.insert(
				HeaderName::from_static("anthropic-version"),
				HeaderValue::from_static(ANTHROPIC_VERSION),
			);
		},
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn openai_dialect_uses_bearer_token() {
		let headers = auth_headers(ProviderDialect::OpenAi, "sk-test", &Map::new())
			.expect("Failed to build headers.");

		assert_eq!(headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()), Some("Bearer sk-test"));
	}

	#[test]
	fn anthropic_dialect_uses_api_key_header_and_version() {
		let mut extra = Map::new();

		extra.insert("anthropic-beta".to_string(), Value::String("tools-2024".to_string()));

		let headers = auth_headers(ProviderDialect::Anthropic, "sk-ant", &extra)
			.expect("Failed to build headers.");

		assert!(headers.get(AUTHORIZATION).is_none());
		assert_eq!(headers.get("x-api-key").and_then(|v| v.to_str().ok()), Some("sk-ant"));
		assert_eq!(
			headers.get("anthropic-version").and_then(|v| v.to_str().ok()),
			Some(ANTHROPIC_VERSION)
		);
		assert_eq!(headers.get("anthropic-beta").and_then(|v| v.to_str().ok()), Some("tools-2024"));
	}

	#[test]
	fn non_string_default_header_is_rejected() {
		let mut extra = Map::new();

		extra.insert("x-retries".to_string(), Value::from(3));

		assert!(matches!(
			auth_headers(ProviderDialect::OpenAi, "sk-test", &extra),
			Err(Error::InvalidConfig { .. })
		));
	}
}
