use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
	Pending,
	InProgress,
	Completed,
}
impl TodoStatus {
	pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Completed];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::InProgress => "in_progress",
			Self::Completed => "completed",
		}
	}
}
impl fmt::Display for TodoStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for TodoStatus {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|status| status.as_str() == raw)
			.ok_or_else(|| Error::UnknownVariant { what: "todo status", value: raw.to_string() })
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Todo {
	pub content: String,
	pub status: TodoStatus,
	#[serde(rename = "activeForm")]
	pub active_form: String,
}

/// A snapshot as submitted for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDraft {
	pub project_path: String,
	#[serde(default)]
	pub git_branch: Option<String>,
	pub todos: Vec<Todo>,
	#[serde(default)]
	pub context: Option<String>,
	#[serde(default)]
	pub linked_context_id: Option<Uuid>,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoSnapshot {
	pub id: Uuid,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	pub project_path: String,
	pub git_branch: Option<String>,
	pub todos: Vec<Todo>,
	pub context: Option<String>,
	pub linked_context_id: Option<Uuid>,
	pub is_active: bool,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}
impl TodoSnapshot {
	pub fn from_draft(id: Uuid, timestamp: OffsetDateTime, draft: SnapshotDraft) -> Self {
		Self {
			id,
			timestamp,
			project_path: draft.project_path,
			git_branch: draft.git_branch,
			todos: draft.todos,
			context: draft.context,
			linked_context_id: draft.linked_context_id,
			is_active: false,
			metadata: draft.metadata,
		}
	}

	/// Counts todos per status, in the order of [`TodoStatus::ALL`].
	pub fn status_counts(&self) -> [(TodoStatus, usize); 3] {
		TodoStatus::ALL
			.map(|status| (status, self.todos.iter().filter(|todo| todo.status == status).count()))
	}
}
