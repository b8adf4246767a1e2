use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Error;

/// File path used when a code context is saved without naming its file.
pub const DEFAULT_CODE_PATH: &str = "snippet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
	Conversation,
	Code,
	Suggestion,
	Error,
}
impl ContextKind {
	pub const ALL: [Self; 4] = [Self::Conversation, Self::Code, Self::Suggestion, Self::Error];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Conversation => "conversation",
			Self::Code => "code",
			Self::Suggestion => "suggestion",
			Self::Error => "error",
		}
	}
}
impl fmt::Display for ContextKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for ContextKind {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str() == raw)
			.ok_or_else(|| Error::UnknownVariant { what: "context kind", value: raw.to_string() })
	}
}

/// Payload of a context entry, one variant per [`ContextKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextContent {
	Conversation { messages: Vec<String> },
	Code { files: BTreeMap<String, String> },
	Suggestion { text: String },
	Error { text: String },
}
impl ContextContent {
	/// Wraps a single block of text into the variant matching `kind`.
	pub fn from_text(kind: ContextKind, text: impl Into<String>, file_path: Option<&str>) -> Self {
		let text = text.into();

		match kind {
			ContextKind::Conversation => Self::Conversation { messages: vec![text] },
			ContextKind::Code => {
				let path = file_path
					.map(str::trim)
					.filter(|path| !path.is_empty())
					.unwrap_or(DEFAULT_CODE_PATH);

				Self::Code { files: BTreeMap::from([(path.to_string(), text)]) }
			},
			ContextKind::Suggestion => Self::Suggestion { text },
			ContextKind::Error => Self::Error { text },
		}
	}

	pub fn kind(&self) -> ContextKind {
		match self {
			Self::Conversation { .. } => ContextKind::Conversation,
			Self::Code { .. } => ContextKind::Code,
			Self::Suggestion { .. } => ContextKind::Suggestion,
			Self::Error { .. } => ContextKind::Error,
		}
	}

	/// Every searchable text fragment, file paths included.
	pub fn texts(&self) -> Vec<&str> {
		match self {
			Self::Conversation { messages } => messages.iter().map(String::as_str).collect(),
			Self::Code { files } => files
				.iter()
				.flat_map(|(path, code)| [path.as_str(), code.as_str()])
				.collect(),
			Self::Suggestion { text } | Self::Error { text } => vec![text.as_str()],
		}
	}
}

/// Ambient tags recorded on every context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
	pub project_path: String,
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default, with = "crate::time_serde::option")]
	pub session_started_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub git_branch: Option<String>,
	/// Forward-compatible fields such as `linked_context_id`.
	#[serde(default, flatten)]
	pub extra: Map<String, Value>,
}

/// A context as submitted for storage, before it has an id or timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDraft {
	pub title: String,
	pub content: ContextContent,
	#[serde(default)]
	pub tags: Vec<String>,
	pub metadata: ContextMetadata,
}
impl ContextDraft {
	pub fn kind(&self) -> ContextKind {
		self.content.kind()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
	pub id: Uuid,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	pub kind: ContextKind,
	pub title: String,
	pub content: ContextContent,
	pub tags: Vec<String>,
	pub metadata: ContextMetadata,
	/// Provider name to answer text. Entries are only ever added.
	#[serde(default)]
	pub ai_responses: BTreeMap<String, String>,
}
impl ContextEntry {
	pub fn from_draft(id: Uuid, timestamp: OffsetDateTime, draft: ContextDraft) -> Self {
		Self {
			id,
			timestamp,
			kind: draft.content.kind(),
			title: draft.title,
			content: draft.content,
			tags: draft.tags,
			metadata: draft.metadata,
			ai_responses: BTreeMap::new(),
		}
	}
}

/// Contexts of one session, grouped for the session overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
	pub session_id: String,
	#[serde(with = "crate::time_serde::option")]
	pub session_started_at: Option<OffsetDateTime>,
	pub context_count: u64,
	#[serde(with = "crate::time_serde")]
	pub first_context_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub last_context_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
	use crate::{ContextContent, ContextKind};

	#[test]
	fn content_variant_follows_kind() {
		for kind in ContextKind::ALL {
			assert_eq!(ContextContent::from_text(kind, "body", None).kind(), kind);
		}
	}

	#[test]
	fn code_content_defaults_file_path() {
		let content = ContextContent::from_text(ContextKind::Code, "fn main() {}", Some("  "));

		assert_eq!(content.texts(), vec!["snippet", "fn main() {}"]);
	}

	#[test]
	fn content_serializes_with_kind_tag() {
		let content = ContextContent::Suggestion { text: "Use a pool.".to_string() };
		let json = serde_json::to_value(&content).expect("serialize failed");

		assert_eq!(json, serde_json::json!({ "kind": "suggestion", "text": "Use a pool." }));
	}

	#[test]
	fn kind_parses_from_wire_name() {
		assert_eq!("error".parse::<ContextKind>(), Ok(ContextKind::Error));
		assert!("bug".parse::<ContextKind>().is_err());
	}
}
