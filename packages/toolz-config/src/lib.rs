mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, ProviderConfig, ProviderDialect, Search, Service, Session, Sqlite, Storage};

use std::{
	env, fs,
	path::{Path, PathBuf},
};

/// Environment variable that relocates the store file regardless of the config source.
pub const ENV_DB_PATH: &str = "TOOLZ_DB_PATH";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	finish(cfg, |key| env::var(key).ok())
}

/// Built-in defaults adjusted by the process environment.
pub fn from_env() -> Result<Config> {
	finish(Config::default(), |key| env::var(key).ok())
}

/// Applies overrides from `lookup`, normalizes, and validates.
pub fn finish<F>(mut cfg: Config, lookup: F) -> Result<Config>
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(path) = lookup(ENV_DB_PATH).filter(|value| !value.trim().is_empty()) {
		cfg.storage.sqlite.path = PathBuf::from(path.trim());
	}

	normalize(&mut cfg, lookup("HOME").or_else(|| lookup("USERPROFILE")).as_deref());
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.sqlite.path.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "storage.sqlite.path must be non-empty.".to_string(),
		});
	}
	if cfg.storage.sqlite.path.starts_with("~") {
		return Err(Error::Validation {
			message: "storage.sqlite.path starts with ~ but no home directory is known.".to_string(),
		});
	}
	if cfg.storage.sqlite.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.sqlite.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.sqlite.busy_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.sqlite.busy_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_limit == 0 {
		return Err(Error::Validation {
			message: "search.max_limit must be greater than zero.".to_string(),
		});
	}

	for (label, value) in
		[("search.default_limit", cfg.search.default_limit), ("search.list_limit", cfg.search.list_limit)]
	{
		if value == 0 || value > cfg.search.max_limit {
			return Err(Error::Validation {
				message: format!("{label} must be between 1 and search.max_limit."),
			});
		}
	}

	if let Some(project_path) = cfg.session.project_path.as_ref()
		&& project_path.as_os_str().is_empty()
	{
		return Err(Error::Validation {
			message: "session.project_path must be non-empty when provided.".to_string(),
		});
	}

	for (name, provider) in &cfg.providers {
		validate_provider(name, provider)?;
	}

	Ok(())
}

fn validate_provider(name: &str, provider: &ProviderConfig) -> Result<()> {
	if !is_valid_provider_name(name) {
		return Err(Error::Validation {
			message: format!(
				"Provider name {name:?} must be non-empty and use only a-z, 0-9, '_' or '-'."
			),
		});
	}

	let api_base = provider.api_base.trim();

	if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
		return Err(Error::Validation {
			message: format!("providers.{name}.api_base must be an http(s) URL."),
		});
	}
	if !provider.path.starts_with('/') {
		return Err(Error::Validation {
			message: format!("providers.{name}.path must start with '/'."),
		});
	}
	if provider.model.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("providers.{name}.model must be non-empty."),
		});
	}
	if !provider.temperature.is_finite() || !(0.0..=2.0).contains(&provider.temperature) {
		return Err(Error::Validation {
			message: format!("providers.{name}.temperature must be in the range 0.0-2.0."),
		});
	}
	if provider.max_tokens == 0 {
		return Err(Error::Validation {
			message: format!("providers.{name}.max_tokens must be greater than zero."),
		});
	}
	if provider.timeout_ms == 0 {
		return Err(Error::Validation {
			message: format!("providers.{name}.timeout_ms must be greater than zero."),
		});
	}
	if provider.default_headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: format!("providers.{name}.default_headers values must be strings."),
		});
	}

	Ok(())
}

pub fn is_valid_provider_name(name: &str) -> bool {
	!name.is_empty()
		&& name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

fn normalize(cfg: &mut Config, home: Option<&str>) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();

	if let Some(home) = home.filter(|home| !home.trim().is_empty())
		&& let Ok(rest) = cfg.storage.sqlite.path.strip_prefix("~")
	{
		cfg.storage.sqlite.path = Path::new(home).join(rest);
	}

	for provider in cfg.providers.values_mut() {
		provider.api_base = provider.api_base.trim().trim_end_matches('/').to_string();

		if provider.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
			provider.api_key = None;
		}
	}
}
