use std::collections::BTreeMap;

use serde_json::{Map, Value};
use sqlx::types::Json;
use uuid::fmt::Hyphenated;

use toolz_domain::{ContextContent, ContextEntry, ContextMetadata, Todo, TodoSnapshot};

use crate::{Cursor, Result, timestamp};

#[derive(Debug, sqlx::FromRow)]
pub struct ContextRow {
	pub rowid: i64,
	pub id: Hyphenated,
	pub timestamp: String,
	pub kind: String,
	pub title: String,
	pub content: Json<ContextContent>,
	pub tags: Json<Vec<String>>,
	pub project_path: String,
	pub session_id: Option<String>,
	pub session_started_at: Option<String>,
	pub git_branch: Option<String>,
	pub metadata: Json<Map<String, Value>>,
	pub ai_responses: Json<BTreeMap<String, String>>,
}
impl ContextRow {
	pub fn cursor(&self) -> Cursor {
		Cursor { timestamp: self.timestamp.clone(), rowid: self.rowid }
	}

	pub fn into_entry(self) -> Result<ContextEntry> {
		let content = self.content.0;

		Ok(ContextEntry {
			id: self.id.into_uuid(),
			timestamp: timestamp::parse(&self.timestamp)?,
			kind: content.kind(),
			title: self.title,
			content,
			tags: self.tags.0,
			metadata: ContextMetadata {
				project_path: self.project_path,
				session_id: self.session_id,
				session_started_at: timestamp::parse_opt(self.session_started_at.as_deref())?,
				git_branch: self.git_branch,
				extra: self.metadata.0,
			},
			ai_responses: self.ai_responses.0,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
	pub rowid: i64,
	pub id: Hyphenated,
	pub timestamp: String,
	pub project_path: String,
	pub git_branch: Option<String>,
	pub context: Option<String>,
	pub linked_context_id: Option<Hyphenated>,
	pub is_active: bool,
	pub todos: Json<Vec<Todo>>,
	pub metadata: Json<Map<String, Value>>,
}
impl SnapshotRow {
	pub fn cursor(&self) -> Cursor {
		Cursor { timestamp: self.timestamp.clone(), rowid: self.rowid }
	}

	pub fn into_snapshot(self) -> Result<TodoSnapshot> {
		Ok(TodoSnapshot {
			id: self.id.into_uuid(),
			timestamp: timestamp::parse(&self.timestamp)?,
			project_path: self.project_path,
			git_branch: self.git_branch,
			todos: self.todos.0,
			context: self.context,
			linked_context_id: self.linked_context_id.map(Hyphenated::into_uuid),
			is_active: self.is_active,
			metadata: self.metadata.0,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionRow {
	pub session_id: String,
	pub session_started_at: Option<String>,
	pub context_count: i64,
	pub first_context_at: String,
	pub last_context_at: String,
}
impl SessionRow {
	pub fn into_summary(self) -> Result<toolz_domain::SessionSummary> {
		Ok(toolz_domain::SessionSummary {
			session_id: self.session_id,
			session_started_at: timestamp::parse_opt(self.session_started_at.as_deref())?,
			context_count: u64::try_from(self.context_count).unwrap_or_default(),
			first_context_at: timestamp::parse(&self.first_context_at)?,
			last_context_at: timestamp::parse(&self.last_context_at)?,
		})
	}
}
