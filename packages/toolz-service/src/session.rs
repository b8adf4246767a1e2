//! Ambient tags for new records: project, git branch and the per-process session.

use std::{
	env,
	path::{Path, PathBuf},
	sync::Arc,
};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::process::Command;

use crate::{BoxFuture, Error, Result};

/// Best-effort branch detection. Failures are `None`, never errors.
pub trait GitBranchLookup
where
	Self: Send + Sync,
{
	fn current_branch<'a>(&'a self, project_path: &'a Path) -> BoxFuture<'a, Option<String>>;
}

/// Asks the `git` binary on `PATH`.
pub struct GitCli;
impl GitBranchLookup for GitCli {
	fn current_branch<'a>(&'a self, project_path: &'a Path) -> BoxFuture<'a, Option<String>> {
		Box::pin(async move {
			let output = Command::new("git")
				.arg("-C")
				.arg(project_path)
				.args(["rev-parse", "--abbrev-ref", "HEAD"])
				.kill_on_drop(true)
				.output()
				.await;
			let output = match output {
				Ok(output) => output,
				Err(err) => {
					tracing::debug!(error = %err, "Failed to run git.");

					return None;
				},
			};

			if !output.status.success() {
				tracing::debug!(
					status = %output.status,
					path = %project_path.display(),
					"Git branch lookup failed."
				);

				return None;
			}

			parse_branch(&String::from_utf8_lossy(&output.stdout))
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
	pub project_path: String,
	pub git_branch: Option<String>,
	pub session_id: String,
	#[serde(with = "toolz_domain::time_serde")]
	pub session_started_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SessionResolver {
	session_id: String,
	session_started_at: OffsetDateTime,
	project_path: Option<PathBuf>,
	git: Arc<dyn GitBranchLookup>,
}
impl SessionResolver {
	/// Starts a new session. Call once per process.
	pub fn new(cfg: &toolz_config::Session, git: Arc<dyn GitBranchLookup>) -> Self {
		Self {
			session_id: uuid::Uuid::new_v4().to_string(),
			session_started_at: toolz_storage::timestamp::now(),
			project_path: cfg.project_path.clone(),
			git,
		}
	}

	pub fn session_id(&self) -> &str {
		&self.session_id
	}

	pub fn session_started_at(&self) -> OffsetDateTime {
		self.session_started_at
	}

	/// Project scope used when a request names none: the configured path, else the working
	/// directory.
	pub fn default_project(&self) -> Result<String> {
		let path = match &self.project_path {
			Some(path) => path.clone(),
			None => env::current_dir().map_err(|err| {
				Error::validation(format!("project_path is required; working directory is unknown: {err}."))
			})?,
		};

		Ok(path.to_string_lossy().into_owned())
	}

	/// Resolves the project scope of one request. An explicit override must not be blank.
	pub fn project(&self, project_override: Option<&str>) -> Result<String> {
		match project_override {
			Some(project_path) => {
				let project_path = project_path.trim();

				if project_path.is_empty() {
					return Err(Error::validation("project_path must be non-empty when provided."));
				}

				Ok(project_path.to_string())
			},
			None => self.default_project(),
		}
	}

	pub async fn resolve(&self, project_override: Option<&str>) -> Result<SessionContext> {
		let project_path = self.project(project_override)?;
		let git_branch = self.git.current_branch(Path::new(&project_path)).await;

		Ok(SessionContext {
			project_path,
			git_branch,
			session_id: self.session_id.clone(),
			session_started_at: self.session_started_at,
		})
	}
}

fn parse_branch(stdout: &str) -> Option<String> {
	let branch = stdout.trim();

	// `--abbrev-ref` prints a bare HEAD when detached.
	if branch.is_empty() || branch == "HEAD" {
		return None;
	}

	Some(branch.to_string())
}
