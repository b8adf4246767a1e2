use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use toolz_domain::{ContextEntry, ContextKind, TodoSnapshot, gate};
use toolz_storage::{
	Order, Page,
	contexts::{self, ContextFilter},
	snapshots::{self, SnapshotFilter},
};

use crate::{Result, ToolzService};

/// Candidates fetched per round trip while scanning for matches.
const SCAN_BATCH: u32 = 200;

static WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\w+").ok());

/// Case-insensitive record matcher.
///
/// A record matches when the whole query occurs as a substring of one of its fields, or when every
/// whitespace-separated query token equals a whole word somewhere in its fields.
#[derive(Debug, Clone)]
pub struct Matcher {
	phrase: String,
	tokens: Vec<String>,
}
impl Matcher {
	/// Returns `None` for a blank query, which matches everything.
	pub fn new(query: &str) -> Option<Self> {
		let phrase = query.trim().to_lowercase();

		if phrase.is_empty() {
			return None;
		}

		let tokens = phrase.split_whitespace().map(str::to_string).collect();

		Some(Self { phrase, tokens })
	}

	pub fn matches<'a, I>(&self, fields: I) -> bool
	where
		I: IntoIterator<Item = &'a str>,
	{
		let lowered = fields.into_iter().map(str::to_lowercase).collect::<Vec<_>>();

		if lowered.iter().any(|field| field.contains(&self.phrase)) {
			return true;
		}

		let vocabulary = lowered.iter().flat_map(|field| words(field)).collect::<HashSet<_>>();

		self.tokens.iter().all(|token| vocabulary.contains(token.as_str()))
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchContextsRequest {
	#[serde(default)]
	pub query: String,
	pub kind: Option<ContextKind>,
	pub project_path: Option<String>,
	/// Matches contexts carrying any one of these tags.
	#[serde(default)]
	pub tags: Vec<String>,
	pub session_id: Option<String>,
	pub git_branch: Option<String>,
	#[serde(default, with = "toolz_domain::time_serde::option")]
	pub since: Option<OffsetDateTime>,
	#[serde(default, with = "toolz_domain::time_serde::option")]
	pub until: Option<OffsetDateTime>,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchSnapshotsRequest {
	#[serde(default)]
	pub query: String,
	pub project_path: Option<String>,
	pub git_branch: Option<String>,
	#[serde(default, with = "toolz_domain::time_serde::option")]
	pub since: Option<OffsetDateTime>,
	#[serde(default, with = "toolz_domain::time_serde::option")]
	pub until: Option<OffsetDateTime>,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextSearchResponse {
	pub items: Vec<ContextEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSearchResponse {
	pub items: Vec<TodoSnapshot>,
}

impl ToolzService {
	pub async fn search_contexts(&self, req: SearchContextsRequest) -> Result<ContextSearchResponse> {
		let limit = self.resolve_limit(req.limit, self.cfg.search.default_limit)?;
		let filter = ContextFilter {
			kind: req.kind,
			project_path: crate::non_blank("project_path", req.project_path)?,
			tags: gate::normalize_tags(&req.tags)?,
			session_id: crate::non_blank("session_id", req.session_id)?,
			git_branch: crate::non_blank("git_branch", req.git_branch)?,
			since: req.since,
			until: req.until,
		};
		let Some(matcher) = Matcher::new(&req.query) else {
			let items =
				contexts::list_contexts(&self.db, &filter, Page::first(limit), Order::NewestFirst)
					.await?;

			return Ok(ContextSearchResponse { items });
		};
		let mut items = Vec::new();
		let mut cursor = None;

		loop {
			let batch =
				contexts::scan_contexts(&self.db, &filter, cursor.as_ref(), SCAN_BATCH).await?;

			for entry in batch.items {
				if matcher.matches(context_fields(&entry)) {
					items.push(entry);

					if items.len() == limit as usize {
						return Ok(ContextSearchResponse { items });
					}
				}
			}

			match batch.next {
				Some(next) => cursor = Some(next),
				None => break,
			}
		}

		tracing::debug!(query = %req.query, hits = items.len(), "Context search finished.");

		Ok(ContextSearchResponse { items })
	}

	pub async fn search_snapshots(
		&self,
		req: SearchSnapshotsRequest,
	) -> Result<SnapshotSearchResponse> {
		let limit = self.resolve_limit(req.limit, self.cfg.search.default_limit)?;
		let filter = SnapshotFilter {
			project_path: crate::non_blank("project_path", req.project_path)?,
			git_branch: crate::non_blank("git_branch", req.git_branch)?,
			since: req.since,
			until: req.until,
		};
		let Some(matcher) = Matcher::new(&req.query) else {
			let items =
				snapshots::list_snapshots(&self.db, &filter, Page::first(limit), Order::NewestFirst)
					.await?;

			return Ok(SnapshotSearchResponse { items });
		};
		let mut items = Vec::new();
		let mut cursor = None;

		loop {
			let batch =
				snapshots::scan_snapshots(&self.db, &filter, cursor.as_ref(), SCAN_BATCH).await?;

			for snapshot in batch.items {
				if matcher.matches(snapshot_fields(&snapshot)) {
					items.push(snapshot);

					if items.len() == limit as usize {
						return Ok(SnapshotSearchResponse { items });
					}
				}
			}

			match batch.next {
				Some(next) => cursor = Some(next),
				None => break,
			}
		}

		tracing::debug!(query = %req.query, hits = items.len(), "Snapshot search finished.");

		Ok(SnapshotSearchResponse { items })
	}
}

fn words(field: &str) -> Vec<&str> {
	match WORD.as_ref() {
		Some(word) => word.find_iter(field).map(|m| m.as_str()).collect(),
		None => field
			.split(|c: char| !(c.is_alphanumeric() || c == '_'))
			.filter(|word| !word.is_empty())
			.collect(),
	}
}

fn context_fields(entry: &ContextEntry) -> Vec<&str> {
	let mut fields = vec![entry.title.as_str()];

	fields.extend(entry.content.texts());
	fields.extend(entry.tags.iter().map(String::as_str));

	fields
}

fn snapshot_fields(snapshot: &TodoSnapshot) -> Vec<&str> {
	let mut fields = snapshot
		.todos
		.iter()
		.flat_map(|todo| [todo.content.as_str(), todo.active_form.as_str()])
		.collect::<Vec<_>>();

	fields.extend(snapshot.context.as_deref());

	fields
}
