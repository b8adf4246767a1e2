use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use toolz_config::{ProviderConfig, ProviderDialect};

use crate::{Error, Result};

/// Sends one system + user exchange to the provider and returns the answer text.
pub async fn ask(cfg: &ProviderConfig, api_key: &str, system: &str, user: &str) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = request_body(cfg, system, user);
	let res = client
		.post(&url)
		.headers(crate::auth_headers(cfg.dialect, api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	tracing::debug!(model = %cfg.model, dialect = ?cfg.dialect, "Received provider answer.");

	parse_answer(cfg.dialect, &json)
}

fn request_body(cfg: &ProviderConfig, system: &str, user: &str) -> Value {
	match cfg.dialect {
		ProviderDialect::OpenAi => serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"messages": [
				{ "role": "system", "content": system },
				{ "role": "user", "content": user },
			],
		}),
		ProviderDialect::Anthropic => serde_json::json!({
			"model": cfg.model,
			"max_tokens": cfg.max_tokens,
			"temperature": cfg.temperature,
			"system": system,
			"messages": [
				{ "role": "user", "content": user },
			],
		}),
	}
}

fn parse_answer(dialect: ProviderDialect, json: &Value) -> Result<String> {
	let answer = match dialect {
		ProviderDialect::OpenAi => json
			.get("choices")
			.and_then(|v| v.as_array())
			.and_then(|arr| arr.first())
			.and_then(|choice| choice.get("message"))
			.and_then(|msg| msg.get("content"))
			.and_then(|c| c.as_str())
			.map(str::to_string),
		ProviderDialect::Anthropic => json.get("content").and_then(|v| v.as_array()).map(|blocks| {
			blocks
				.iter()
				.filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
				.filter_map(|block| block.get("text").and_then(|t| t.as_str()))
				.collect::<Vec<_>>()
				.join("\n")
		}),
	};

	answer.ok_or_else(|| Error::InvalidResponse {
		message: "Provider response is missing answer text.".to_string(),
	})
}
