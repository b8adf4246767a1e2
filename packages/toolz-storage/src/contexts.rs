use sqlx::{QueryBuilder, Sqlite, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use toolz_domain::{ContextEntry, ContextKind, SessionSummary};

use crate::{
	Batch, Cursor, Error, Order, Page, Result,
	db::Db,
	models::{ContextRow, SessionRow},
	timestamp,
};

const CONTEXT_COLUMNS: &str = "\
rowid, id, timestamp, kind, title, content, tags, project_path, session_id, session_started_at, \
git_branch, metadata, ai_responses";

/// Structured context filter. Every field is optional and all present fields must match.
///
/// `tags` matches a context carrying any one of the listed tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextFilter {
	pub kind: Option<ContextKind>,
	pub project_path: Option<String>,
	pub tags: Vec<String>,
	pub session_id: Option<String>,
	pub git_branch: Option<String>,
	pub since: Option<OffsetDateTime>,
	pub until: Option<OffsetDateTime>,
}

pub async fn insert_context(db: &Db, entry: &ContextEntry) -> Result<()> {
	let session_started_at =
		entry.metadata.session_started_at.map(timestamp::format).transpose()?;

	sqlx::query(
		"\
INSERT INTO contexts (
	id,
	timestamp,
	kind,
	title,
	content,
	tags,
	project_path,
	session_id,
	session_started_at,
	git_branch,
	metadata,
	ai_responses
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
	)
	.bind(entry.id.hyphenated())
	.bind(timestamp::format(entry.timestamp)?)
	.bind(entry.content.kind().as_str())
	.bind(entry.title.as_str())
	.bind(Json(&entry.content))
	.bind(Json(&entry.tags))
	.bind(entry.metadata.project_path.as_str())
	.bind(entry.metadata.session_id.as_deref())
	.bind(session_started_at)
	.bind(entry.metadata.git_branch.as_deref())
	.bind(Json(&entry.metadata.extra))
	.bind(Json(&entry.ai_responses))
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn get_context(db: &Db, id: Uuid) -> Result<ContextEntry> {
	let sql = format!("SELECT {CONTEXT_COLUMNS} FROM contexts WHERE id = ?");
	let row: Option<ContextRow> =
		sqlx::query_as(&sql).bind(id.hyphenated()).fetch_optional(&db.pool).await?;

	row.ok_or_else(|| Error::NotFound(format!("context {id}")))?.into_entry()
}

pub async fn delete_context(db: &Db, id: Uuid) -> Result<bool> {
	let result =
		sqlx::query("DELETE FROM contexts WHERE id = ?").bind(id.hyphenated()).execute(&db.pool).await?;

	Ok(result.rows_affected() > 0)
}

pub async fn list_contexts(
	db: &Db,
	filter: &ContextFilter,
	page: Page,
	order: Order,
) -> Result<Vec<ContextEntry>> {
	let mut builder = filtered(filter)?;

	builder.push(order.sql());
	builder.push(" LIMIT ").push_bind(i64::from(page.limit));
	builder.push(" OFFSET ").push_bind(i64::from(page.offset));

	let rows: Vec<ContextRow> = builder.build_query_as().fetch_all(&db.pool).await?;

	rows.into_iter().map(ContextRow::into_entry).collect()
}

/// Newest-first batch of matching contexts strictly older than `after`.
pub async fn scan_contexts(
	db: &Db,
	filter: &ContextFilter,
	after: Option<&Cursor>,
	limit: u32,
) -> Result<Batch<ContextEntry>> {
	let mut builder = filtered(filter)?;

	if let Some(after) = after {
		after.push_before(&mut builder);
	}

	builder.push(Order::NewestFirst.sql());
	builder.push(" LIMIT ").push_bind(i64::from(limit));

	let rows: Vec<ContextRow> = builder.build_query_as().fetch_all(&db.pool).await?;
	let next = match rows.last() {
		Some(last) if rows.len() == limit as usize => Some(last.cursor()),
		_ => None,
	};
	let items = rows.into_iter().map(ContextRow::into_entry).collect::<Result<_>>()?;

	Ok(Batch { items, next })
}

/// Records `answer` under `provider` unless that provider already answered.
///
/// Returns `false` when an answer was already present. The check and the write are a single
/// statement, so concurrent writers for the same context never overwrite each other.
pub async fn insert_ai_response(db: &Db, id: Uuid, provider: &str, answer: &str) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE contexts
SET ai_responses = json_insert(ai_responses, '$.' || json_quote(?1), ?2)
WHERE id = ?3
	AND json_type(ai_responses, '$.' || json_quote(?1)) IS NULL",
	)
	.bind(provider)
	.bind(answer)
	.bind(id.hyphenated())
	.execute(&db.pool)
	.await?;

	if result.rows_affected() > 0 {
		return Ok(true);
	}

	let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM contexts WHERE id = ?")
		.bind(id.hyphenated())
		.fetch_optional(&db.pool)
		.await?;

	match exists {
		Some(_) => Ok(false),
		None => Err(Error::NotFound(format!("context {id}"))),
	}
}

/// Sessions of a project, most recently started first.
pub async fn list_sessions(db: &Db, project_path: &str, limit: u32) -> Result<Vec<SessionSummary>> {
	let rows: Vec<SessionRow> = sqlx::query_as(
		"\
SELECT
	session_id,
	MIN(session_started_at) AS session_started_at,
	COUNT(*) AS context_count,
	MIN(timestamp) AS first_context_at,
	MAX(timestamp) AS last_context_at
FROM contexts
WHERE project_path = ?
	AND session_id IS NOT NULL
GROUP BY session_id
ORDER BY session_started_at DESC, last_context_at DESC
LIMIT ?",
	)
	.bind(project_path)
	.bind(i64::from(limit))
	.fetch_all(&db.pool)
	.await?;

	rows.into_iter().map(SessionRow::into_summary).collect()
}

fn filtered(filter: &ContextFilter) -> Result<QueryBuilder<'_, Sqlite>> {
	let since = filter.since.map(timestamp::format).transpose()?;
	let until = filter.until.map(timestamp::format).transpose()?;
	let mut builder: QueryBuilder<'_, Sqlite> =
		QueryBuilder::new(format!("SELECT {CONTEXT_COLUMNS} FROM contexts WHERE 1 = 1"));

	if let Some(kind) = filter.kind {
		builder.push(" AND kind = ").push_bind(kind.as_str());
	}
	if let Some(project_path) = filter.project_path.as_deref() {
		builder.push(" AND project_path = ").push_bind(project_path);
	}
	if !filter.tags.is_empty() {
		builder.push(" AND EXISTS (SELECT 1 FROM json_each(contexts.tags) WHERE json_each.value IN (");

		let mut tags = builder.separated(", ");

		for tag in &filter.tags {
			tags.push_bind(tag.as_str());
		}

		builder.push("))");
	}
	if let Some(session_id) = filter.session_id.as_deref() {
		builder.push(" AND session_id = ").push_bind(session_id);
	}
	if let Some(git_branch) = filter.git_branch.as_deref() {
		builder.push(" AND git_branch = ").push_bind(git_branch);
	}
	if let Some(since) = since {
		builder.push(" AND timestamp >= ").push_bind(since);
	}
	if let Some(until) = until {
		builder.push(" AND timestamp <= ").push_bind(until);
	}

	Ok(builder)
}
