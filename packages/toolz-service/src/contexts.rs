use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use toolz_domain::{
	ContextContent, ContextDraft, ContextEntry, ContextKind, ContextMetadata, SessionSummary, gate,
};
use toolz_providers::prompt;
use toolz_storage::{
	Order, Page,
	contexts::{self, ContextFilter},
	timestamp,
};

use crate::{Error, Result, ToolzService};

/// Metadata key linking a context to another context.
pub const LINKED_CONTEXT_KEY: &str = "linked_context_id";

/// Context payload as sent by callers: plain text wrapped per `kind`, or an explicit variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentInput {
	Text(String),
	Structured(ContextContent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveContextRequest {
	pub kind: ContextKind,
	pub title: String,
	pub content: ContentInput,
	/// File name for text saved as `code`.
	pub file_path: Option<String>,
	#[serde(default)]
	pub tags: Vec<String>,
	pub project_path: Option<String>,
	pub linked_context_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetContextRequest {
	pub context_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteContextRequest {
	pub context_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListContextsRequest {
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
	#[serde(default)]
	pub offset: u32,
	#[serde(default)]
	pub oldest_first: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AskProviderRequest {
	pub context_id: Uuid,
	pub provider: String,
	pub question: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListSessionsRequest {
	pub project_path: Option<String>,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextResponse {
	pub context: ContextEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextListResponse {
	pub items: Vec<ContextEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
	pub id: Uuid,
	pub deleted: bool,
}

/// Outcome of asking a provider. A provider failure is reported in `error`, not as a failed call.
#[derive(Debug, Clone, Serialize)]
pub struct AskProviderResponse {
	pub context_id: Uuid,
	pub provider: String,
	pub question: Option<String>,
	pub answer: Option<String>,
	/// False when the provider had already answered, so the earlier answer was kept.
	pub stored: bool,
	pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
	pub project_path: String,
	pub sessions: Vec<SessionSummary>,
}

impl ToolzService {
	pub async fn save_context(&self, req: SaveContextRequest) -> Result<ContextResponse> {
		let content = match req.content {
			ContentInput::Text(text) =>
				ContextContent::from_text(req.kind, text, req.file_path.as_deref()),
			ContentInput::Structured(content) => {
				if content.kind() != req.kind {
					return Err(Error::validation(format!(
						"content is a {} payload but kind is {}.",
						content.kind(),
						req.kind
					)));
				}

				content
			},
		};
		let session = self.session.resolve(req.project_path.as_deref()).await?;
		let mut extra = Map::new();

		if let Some(linked) = req.linked_context_id {
			extra.insert(LINKED_CONTEXT_KEY.to_string(), Value::String(linked.to_string()));
		}

		let mut draft = ContextDraft {
			title: req.title,
			content,
			tags: req.tags,
			metadata: ContextMetadata {
				project_path: session.project_path,
				session_id: Some(session.session_id),
				session_started_at: Some(session.session_started_at),
				git_branch: session.git_branch,
				extra,
			},
		};

		gate::check_context(&mut draft)?;

		let entry = ContextEntry::from_draft(Uuid::new_v4(), timestamp::now(), draft);

		contexts::insert_context(&self.db, &entry).await?;

		tracing::info!(
			context_id = %entry.id,
			kind = %entry.kind,
			project_path = %entry.metadata.project_path,
			"Saved context."
		);

		Ok(ContextResponse { context: entry })
	}

	pub async fn get_context(&self, req: GetContextRequest) -> Result<ContextResponse> {
		let context = contexts::get_context(&self.db, req.context_id).await?;

		Ok(ContextResponse { context })
	}

	/// Deleting an unknown id is not an error; `deleted` reports whether a row went away.
	pub async fn delete_context(&self, req: DeleteContextRequest) -> Result<DeleteResponse> {
		let deleted = contexts::delete_context(&self.db, req.context_id).await?;

		tracing::info!(context_id = %req.context_id, deleted, "Deleted context.");

		Ok(DeleteResponse { id: req.context_id, deleted })
	}

	pub async fn list_contexts(&self, req: ListContextsRequest) -> Result<ContextListResponse> {
		let limit = self.resolve_limit(req.limit, self.cfg.search.list_limit)?;
		let filter = ContextFilter {
			kind: req.kind,
			project_path: crate::non_blank("project_path", req.project_path)?,
			tags: gate::normalize_tags(&req.tags)?,
			session_id: crate::non_blank("session_id", req.session_id)?,
			git_branch: crate::non_blank("git_branch", req.git_branch)?,
			since: req.since,
			until: req.until,
		};
		let order = if req.oldest_first { Order::OldestFirst } else { Order::NewestFirst };
		let items = contexts::list_contexts(
			&self.db,
			&filter,
			Page { limit, offset: req.offset },
			order,
		)
		.await?;

		Ok(ContextListResponse { items })
	}

	/// Asks a configured provider about a stored context and records the first answer it gives.
	///
	/// The provider call holds no store lock; the answer is written with a single
	/// insert-if-absent statement afterwards.
	pub async fn ask_provider(&self, req: AskProviderRequest) -> Result<AskProviderResponse> {
		let provider = req.provider.trim().to_string();
		let Some(provider_cfg) = self.cfg.providers.get(&provider) else {
			let known = self.cfg.providers.keys().cloned().collect::<Vec<_>>().join(", ");

			return Err(Error::validation(format!(
				"Unknown provider {provider:?}. Configured providers: [{known}]."
			)));
		};
		let question = req
			.question
			.map(|question| question.trim().to_string())
			.filter(|question| !question.is_empty());
		let entry = contexts::get_context(&self.db, req.context_id).await?;
		let system = prompt::system_prompt(question.as_deref());
		let user = prompt::render_context(&entry, question.as_deref());

		match self.providers.opinion.ask(&provider, provider_cfg, system, &user).await {
			Ok(answer) => {
				let stored =
					contexts::insert_ai_response(&self.db, entry.id, &provider, &answer).await?;

				tracing::info!(context_id = %entry.id, provider = %provider, stored, "Recorded provider answer.");

				Ok(AskProviderResponse {
					context_id: entry.id,
					provider,
					question,
					answer: Some(answer),
					stored,
					error: None,
				})
			},
			Err(err) => {
				tracing::warn!(context_id = %entry.id, provider = %provider, error = %err, "Provider call failed.");

				Ok(AskProviderResponse {
					context_id: entry.id,
					provider,
					question,
					answer: None,
					stored: false,
					error: Some(err.to_string()),
				})
			},
		}
	}

	pub async fn list_sessions(&self, req: ListSessionsRequest) -> Result<SessionListResponse> {
		let limit = self.resolve_limit(req.limit, self.cfg.search.default_limit)?;
		let project_path = self.session.project(req.project_path.as_deref())?;
		let sessions = contexts::list_sessions(&self.db, &project_path, limit).await?;

		Ok(SessionListResponse { project_path, sessions })
	}
}
