//! Write gate: every record passes through here before it reaches the store.

use std::collections::HashSet;

use crate::{ContextContent, ContextDraft, Error, Result, SnapshotDraft, Todo};

pub const MAX_TITLE_CHARS: usize = 512;
pub const MAX_TAGS: usize = 32;
pub const MAX_TAG_CHARS: usize = 64;

/// Validates a context draft and normalizes its tags in place. The title is kept as given.
pub fn check_context(draft: &mut ContextDraft) -> Result<()> {
	if draft.title.trim().is_empty() {
		return Err(Error::validation("title", "must be non-empty."));
	}
	if draft.title.chars().count() > MAX_TITLE_CHARS {
		return Err(Error::validation("title", format!("must be at most {MAX_TITLE_CHARS} characters.")));
	}

	check_content(&draft.content)?;
	check_project_path(&draft.metadata.project_path)?;

	draft.tags = normalize_tags(&draft.tags)?;

	Ok(())
}

pub fn check_snapshot(draft: &SnapshotDraft) -> Result<()> {
	check_project_path(&draft.project_path)?;

	for (idx, todo) in draft.todos.iter().enumerate() {
		check_todo(idx, todo)?;
	}

	Ok(())
}

pub fn check_project_path(project_path: &str) -> Result<()> {
	if project_path.trim().is_empty() {
		return Err(Error::validation("project_path", "must be non-empty."));
	}

	Ok(())
}

/// Trims, rejects blanks and collapses duplicates while keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
	let mut seen = HashSet::new();
	let mut out = Vec::with_capacity(tags.len());

	for tag in tags {
		let tag = tag.trim();

		if tag.is_empty() {
			return Err(Error::validation("tags", "must not contain blank tags."));
		}
		if tag.chars().count() > MAX_TAG_CHARS {
			return Err(Error::validation("tags", format!("each tag must be at most {MAX_TAG_CHARS} characters.")));
		}
		if seen.insert(tag.to_string()) {
			out.push(tag.to_string());
		}
	}

	if out.len() > MAX_TAGS {
		return Err(Error::validation("tags", format!("must hold at most {MAX_TAGS} tags.")));
	}

	Ok(out)
}

fn check_content(content: &ContextContent) -> Result<()> {
	let blank = match content {
		ContextContent::Conversation { messages } =>
			messages.is_empty() || messages.iter().all(|message| message.trim().is_empty()),
		ContextContent::Code { files } =>
			files.is_empty()
				|| files.keys().any(|path| path.trim().is_empty())
				|| files.values().all(|code| code.trim().is_empty()),
		ContextContent::Suggestion { text } | ContextContent::Error { text } => text.trim().is_empty(),
	};

	if blank {
		return Err(Error::validation("content", "must be non-empty."));
	}

	Ok(())
}

fn check_todo(idx: usize, todo: &Todo) -> Result<()> {
	if todo.content.trim().is_empty() {
		return Err(Error::validation(format!("todos[{idx}].content"), "must be non-empty."));
	}
	if todo.active_form.trim().is_empty() {
		return Err(Error::validation(format!("todos[{idx}].activeForm"), "must be non-empty."));
	}

	Ok(())
}
