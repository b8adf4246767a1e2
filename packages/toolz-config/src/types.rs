use std::{collections::BTreeMap, env, path::PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	#[serde(default)]
	pub storage: Storage,
	#[serde(default)]
	pub session: Session,
	#[serde(default)]
	pub search: Search,
	/// Opinion providers keyed by the name clients use to address them, e.g. "chatgpt".
	#[serde(default = "default_providers")]
	pub providers: BTreeMap<String, ProviderConfig>,
}
impl Default for Config {
	fn default() -> Self {
		Self {
			service: Service::default(),
			storage: Storage::default(),
			session: Session::default(),
			search: Search::default(),
			providers: default_providers(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: default_log_level() }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Storage {
	#[serde(default)]
	pub sqlite: Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sqlite {
	/// Store file shared by every session on the machine. A leading `~` is expanded.
	#[serde(default = "default_db_path")]
	pub path: PathBuf,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
	#[serde(default = "default_busy_timeout_ms")]
	pub busy_timeout_ms: u64,
}
impl Default for Sqlite {
	fn default() -> Self {
		Self {
			path: default_db_path(),
			pool_max_conns: default_pool_max_conns(),
			busy_timeout_ms: default_busy_timeout_ms(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Session {
	/// Overrides the working directory as the project scope of new records.
	pub project_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Search {
	#[serde(default = "default_search_limit")]
	pub default_limit: u32,
	#[serde(default = "default_list_limit")]
	pub list_limit: u32,
	#[serde(default = "default_max_limit")]
	pub max_limit: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_limit: default_search_limit(),
			list_limit: default_list_limit(),
			max_limit: default_max_limit(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderDialect {
	/// `POST {api_base}{path}` with an OpenAI chat-completions body.
	OpenAi,
	/// `POST {api_base}{path}` with an Anthropic messages body.
	Anthropic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
	pub dialect: ProviderDialect,
	pub api_base: String,
	pub path: String,
	pub model: String,
	/// Inline key. Takes precedence over `api_key_env`.
	pub api_key: Option<String>,
	/// Environment variable holding the key.
	pub api_key_env: Option<String>,
	#[serde(default = "default_temperature")]
	pub temperature: f32,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}
impl ProviderConfig {
	pub fn resolve_api_key(&self) -> Option<String> {
		if let Some(key) = self.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
			return Some(key.to_string());
		}

		let var = self.api_key_env.as_deref()?;

		env::var(var).ok().filter(|key| !key.trim().is_empty())
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_db_path() -> PathBuf {
	PathBuf::from("~/.toolz/contexts.db")
}

fn default_pool_max_conns() -> u32 {
	4
}

fn default_busy_timeout_ms() -> u64 {
	5_000
}

fn default_search_limit() -> u32 {
	10
}

fn default_list_limit() -> u32 {
	20
}

fn default_max_limit() -> u32 {
	200
}

fn default_temperature() -> f32 {
	0.7
}

fn default_max_tokens() -> u32 {
	4_096
}

fn default_timeout_ms() -> u64 {
	120_000
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
	let openai_compatible = |api_base: &str, path: &str, model: &str, key_env: &str| {
		ProviderConfig {
			dialect: ProviderDialect::OpenAi,
			api_base: api_base.to_string(),
			path: path.to_string(),
			model: model.to_string(),
			api_key: None,
			api_key_env: Some(key_env.to_string()),
			temperature: default_temperature(),
			max_tokens: default_max_tokens(),
			timeout_ms: default_timeout_ms(),
			default_headers: Map::new(),
		}
	};
	let mut providers = BTreeMap::new();

	providers.insert(
		"chatgpt".to_string(),
		openai_compatible("https://api.openai.com", "/v1/chat/completions", "gpt-5", "OPENAI_API_KEY"),
	);
	providers.insert(
		"deepseek".to_string(),
		openai_compatible("https://api.deepseek.com", "/chat/completions", "deepseek-chat", "DEEPSEEK_API_KEY"),
	);
	providers.insert(
		"gemini".to_string(),
		openai_compatible(
			"https://generativelanguage.googleapis.com",
			"/v1beta/openai/chat/completions",
			"gemini-2.0-flash",
			"GOOGLE_API_KEY",
		),
	);
	providers.insert(
		"claude".to_string(),
		ProviderConfig {
			dialect: ProviderDialect::Anthropic,
			api_base: "https://api.anthropic.com".to_string(),
			path: "/v1/messages".to_string(),
			model: "claude-sonnet-4-5-20250929".to_string(),
			api_key: None,
			api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
			temperature: default_temperature(),
			max_tokens: default_max_tokens(),
			timeout_ms: default_timeout_ms(),
			default_headers: Map::new(),
		},
	);

	providers
}
