use time::format_description::well_known::Rfc3339;

use toolz_domain::{ContextContent, ContextEntry};

const REVIEW_SYSTEM: &str = "\
You are a senior software engineering consultant providing second opinions on code, architecture \
decisions, and implementation plans.

Your role is to:
- Provide constructive, balanced feedback
- Highlight both strengths and potential issues
- Suggest alternatives when appropriate
- Point out edge cases or security concerns
- Be concise but thorough

Format your response clearly with sections as needed.";
const QUESTION_SYSTEM: &str = "\
You are a senior software engineering consultant answering questions about code, architecture \
decisions, and implementation plans.

Provide clear, actionable answers based on the context provided.";
const REVIEW_REQUEST: &str = "Please provide a second opinion on the above context.";

pub fn system_prompt(question: Option<&str>) -> &'static str {
	match question {
		Some(_) => QUESTION_SYSTEM,
		None => REVIEW_SYSTEM,
	}
}

/// Renders a context as Markdown, ending with the question or a generic review request.
pub fn render_context(entry: &ContextEntry, question: Option<&str>) -> String {
	let mut parts = vec![
		format!("# Context: {}", entry.title),
		format!("\n**Type:** {}", entry.kind),
		format!("**Timestamp:** {}", entry.timestamp.format(&Rfc3339).unwrap_or_default()),
	];

	if !entry.tags.is_empty() {
		parts.push(format!("**Tags:** {}", entry.tags.join(", ")));
	}

	parts.push("\n## Content\n".to_string());

	match &entry.content {
		ContextContent::Conversation { messages } => {
			parts.push("### Conversation\n".to_string());
			parts.extend(messages.iter().cloned());
		},
		ContextContent::Code { files } => {
			parts.push("### Code\n".to_string());

			for (path, code) in files {
				parts.push(format!("**File:** `{path}`\n```\n{code}\n```\n"));
			}
		},
		ContextContent::Suggestion { text } => parts.push(format!("### Suggestion\n{text}\n")),
		ContextContent::Error { text } =>
			parts.push(format!("### Error/Debug Info\n```\n{text}\n```\n")),
	}

	match question {
		Some(question) => parts.push(format!("\n---\n**Question:** {question}")),
		None => parts.push(format!("\n---\n{REVIEW_REQUEST}")),
	}

	parts.join("\n")
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use time::macros::datetime;
	use uuid::Uuid;

	use toolz_domain::{ContextKind, ContextMetadata};

	use super::*;

	fn entry(content: ContextContent, tags: &[&str]) -> ContextEntry {
		ContextEntry {
			id: Uuid::nil(),
			timestamp: datetime!(2026-02-03 04:05:06 UTC),
			kind: content.kind(),
			title: "Flaky login".to_string(),
			content,
			tags: tags.iter().map(|tag| tag.to_string()).collect(),
			metadata: ContextMetadata {
				project_path: "/repo/a".to_string(),
				session_id: None,
				session_started_at: None,
				git_branch: None,
				extra: Default::default(),
			},
			ai_responses: BTreeMap::new(),
		}
	}

	#[test]
	fn question_is_appended_and_changes_the_system_prompt() {
		let entry = entry(ContextContent::from_text(ContextKind::Error, "401", None), &["auth"]);
		let rendered = render_context(&entry, Some("Why does this fail?"));

		assert!(rendered.starts_with("# Context: Flaky login"));
		assert!(rendered.contains("**Type:** error"));
		assert!(rendered.contains("**Tags:** auth"));
		assert!(rendered.contains("### Error/Debug Info\n```\n401\n```"));
		assert!(rendered.ends_with("**Question:** Why does this fail?"));
		assert_eq!(system_prompt(Some("q")), QUESTION_SYSTEM);
	}

	#[test]
	fn review_request_is_used_without_a_question() {
		let entry = entry(
			ContextContent::from_text(ContextKind::Code, "fn main() {}", Some("src/main.rs")),
			&[],
		);
		let rendered = render_context(&entry, None);

		assert!(!rendered.contains("**Tags:**"));
		assert!(rendered.contains("**File:** `src/main.rs`"));
		assert!(rendered.ends_with(REVIEW_REQUEST));
		assert_eq!(system_prompt(None), REVIEW_SYSTEM);
	}
}
