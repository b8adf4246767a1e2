pub mod contexts;
pub mod search;
pub mod session;
pub mod snapshots;

mod error;

pub use contexts::{
	AskProviderRequest, AskProviderResponse, ContextListResponse, ContextResponse,
	DeleteContextRequest, DeleteResponse, GetContextRequest, ListContextsRequest,
	ListSessionsRequest, SaveContextRequest, SessionListResponse,
};
pub use error::{Error, Result, STORE_UNAVAILABLE};
pub use search::{
	ContextSearchResponse, Matcher, SearchContextsRequest, SearchSnapshotsRequest,
	SnapshotSearchResponse,
};
pub use session::{GitBranchLookup, GitCli, SessionContext, SessionResolver};
pub use snapshots::{
	DeleteSnapshotRequest, GetSnapshotRequest, ListSnapshotsRequest, RestoreSnapshotRequest,
	SaveSnapshotRequest, SnapshotListResponse, SnapshotResponse,
};

use std::{future::Future, pin::Pin, sync::Arc};

use toolz_config::{Config, ProviderConfig};
use toolz_providers::opinion;
use toolz_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Produces commentary text on a rendered context.
pub trait OpinionProvider
where
	Self: Send + Sync,
{
	fn ask<'a>(
		&'a self,
		name: &'a str,
		cfg: &'a ProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, toolz_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub opinion: Arc<dyn OpinionProvider>,
}
impl Providers {
	pub fn new(opinion: Arc<dyn OpinionProvider>) -> Self {
		Self { opinion }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { opinion: Arc::new(DefaultProviders) }
	}
}

pub struct ToolzService {
	pub cfg: Config,
	pub db: Db,
	pub session: SessionResolver,
	pub providers: Providers,
}
impl ToolzService {
	pub fn new(cfg: Config, db: Db) -> Self {
		let session = SessionResolver::new(&cfg.session, Arc::new(GitCli));

		Self { cfg, db, session, providers: Providers::default() }
	}

	pub fn with_parts(cfg: Config, db: Db, session: SessionResolver, providers: Providers) -> Self {
		Self { cfg, db, session, providers }
	}

	/// Applies the configured default and rejects limits outside `1..=search.max_limit`.
	pub fn resolve_limit(&self, requested: Option<u32>, default: u32) -> Result<u32> {
		let limit = requested.unwrap_or(default);

		if limit == 0 || limit > self.cfg.search.max_limit {
			return Err(Error::validation(format!(
				"limit must be between 1 and {}.",
				self.cfg.search.max_limit
			)));
		}

		Ok(limit)
	}
}

struct DefaultProviders;
impl OpinionProvider for DefaultProviders {
	fn ask<'a>(
		&'a self,
		name: &'a str,
		cfg: &'a ProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, toolz_providers::Result<String>> {
		Box::pin(async move {
			let api_key =
				cfg.resolve_api_key().ok_or_else(|| toolz_providers::Error::InvalidConfig {
					message: format!("No API key is configured for provider {name:?}."),
				})?;

			opinion::ask(cfg, &api_key, system, user).await
		})
	}
}

/// Optional string filters must not be blank when present.
pub(crate) fn non_blank(field: &str, value: Option<String>) -> Result<Option<String>> {
	match value {
		Some(value) if value.trim().is_empty() =>
			Err(Error::validation(format!("{field} must be non-empty when provided."))),
		value => Ok(value),
	}
}
