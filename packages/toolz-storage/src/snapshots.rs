use sqlx::{QueryBuilder, Sqlite, SqliteConnection, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use toolz_domain::TodoSnapshot;

use crate::{Batch, Cursor, Error, Order, Page, Result, db::Db, models::SnapshotRow, timestamp};

const SNAPSHOT_COLUMNS: &str =
	"rowid, id, timestamp, project_path, git_branch, context, linked_context_id, is_active, todos, metadata";

/// Structured snapshot filter. Every field is optional and all present fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFilter {
	pub project_path: Option<String>,
	pub git_branch: Option<String>,
	pub since: Option<OffsetDateTime>,
	pub until: Option<OffsetDateTime>,
}

/// Inserts `snapshot` and makes it the only active snapshot of its project, atomically.
///
/// `BEGIN IMMEDIATE` takes the database write lock up front, so writers from every process
/// sharing the file serialize here. Dropping the future before commit rolls everything back.
pub async fn insert_snapshot_and_activate(db: &Db, snapshot: &TodoSnapshot) -> Result<()> {
	let mut tx = db.pool.begin_with("BEGIN IMMEDIATE").await?;

	insert_snapshot_conn(&mut tx, snapshot).await?;
	activate_conn(&mut tx, &snapshot.project_path, snapshot.id).await?;

	tx.commit().await?;

	Ok(())
}

/// Makes `id` the only active snapshot of its project and returns it.
///
/// Fails with [`Error::NotFound`] and changes nothing if the snapshot no longer exists.
pub async fn activate(db: &Db, id: Uuid) -> Result<TodoSnapshot> {
	let mut tx = db.pool.begin_with("BEGIN IMMEDIATE").await?;
	let snapshot = activate_existing_conn(&mut tx, id).await?;

	tx.commit().await?;

	Ok(snapshot)
}

pub async fn get_snapshot(db: &Db, id: Uuid) -> Result<TodoSnapshot> {
	let mut conn = db.pool.acquire().await?;

	fetch_snapshot_conn(&mut conn, id).await
}

pub async fn get_active_snapshot(db: &Db, project_path: &str) -> Result<TodoSnapshot> {
	let sql = format!(
		"SELECT {SNAPSHOT_COLUMNS} FROM todo_snapshots WHERE project_path = ? AND is_active = 1"
	);
	let row: Option<SnapshotRow> =
		sqlx::query_as(&sql).bind(project_path).fetch_optional(&db.pool).await?;

	row.ok_or_else(|| Error::NotFound(format!("active snapshot for {project_path}")))?
		.into_snapshot()
}

/// Deleting the active snapshot leaves the project without one.
pub async fn delete_snapshot(db: &Db, id: Uuid) -> Result<bool> {
	let result = sqlx::query("DELETE FROM todo_snapshots WHERE id = ?")
		.bind(id.hyphenated())
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn list_snapshots(
	db: &Db,
	filter: &SnapshotFilter,
	page: Page,
	order: Order,
) -> Result<Vec<TodoSnapshot>> {
	let mut builder = filtered(filter)?;

	builder.push(order.sql());
	builder.push(" LIMIT ").push_bind(i64::from(page.limit));
	builder.push(" OFFSET ").push_bind(i64::from(page.offset));

	let rows: Vec<SnapshotRow> = builder.build_query_as().fetch_all(&db.pool).await?;

	rows.into_iter().map(SnapshotRow::into_snapshot).collect()
}

/// Newest-first batch of matching snapshots strictly older than `after`.
pub async fn scan_snapshots(
	db: &Db,
	filter: &SnapshotFilter,
	after: Option<&Cursor>,
	limit: u32,
) -> Result<Batch<TodoSnapshot>> {
	let mut builder = filtered(filter)?;

	if let Some(after) = after {
		after.push_before(&mut builder);
	}

	builder.push(Order::NewestFirst.sql());
	builder.push(" LIMIT ").push_bind(i64::from(limit));

	let rows: Vec<SnapshotRow> = builder.build_query_as().fetch_all(&db.pool).await?;
	let next = match rows.last() {
		Some(last) if rows.len() == limit as usize => Some(last.cursor()),
		_ => None,
	};
	let items = rows.into_iter().map(SnapshotRow::into_snapshot).collect::<Result<_>>()?;

	Ok(Batch { items, next })
}

fn filtered(filter: &SnapshotFilter) -> Result<QueryBuilder<'_, Sqlite>> {
	let since = filter.since.map(timestamp::format).transpose()?;
	let until = filter.until.map(timestamp::format).transpose()?;
	let mut builder: QueryBuilder<'_, Sqlite> =
		QueryBuilder::new(format!("SELECT {SNAPSHOT_COLUMNS} FROM todo_snapshots WHERE 1 = 1"));

	if let Some(project_path) = filter.project_path.as_deref() {
		builder.push(" AND project_path = ").push_bind(project_path);
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

async fn activate_existing_conn(conn: &mut SqliteConnection, id: Uuid) -> Result<TodoSnapshot> {
	let project_path: Option<String> =
		sqlx::query_scalar("SELECT project_path FROM todo_snapshots WHERE id = ?")
			.bind(id.hyphenated())
			.fetch_optional(&mut *conn)
			.await?;
	let project_path = project_path.ok_or_else(|| Error::NotFound(format!("snapshot {id}")))?;

	activate_conn(conn, &project_path, id).await?;

	fetch_snapshot_conn(conn, id).await
}

async fn insert_snapshot_conn(conn: &mut SqliteConnection, snapshot: &TodoSnapshot) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO todo_snapshots (
	id,
	timestamp,
	project_path,
	git_branch,
	context,
	linked_context_id,
	is_active,
	todos,
	metadata
)
VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
	)
	.bind(snapshot.id.hyphenated())
	.bind(timestamp::format(snapshot.timestamp)?)
	.bind(snapshot.project_path.as_str())
	.bind(snapshot.git_branch.as_deref())
	.bind(snapshot.context.as_deref())
	.bind(snapshot.linked_context_id.map(|id| id.hyphenated()))
	.bind(Json(&snapshot.todos))
	.bind(Json(&snapshot.metadata))
	.execute(&mut *conn)
	.await?;

	Ok(())
}

async fn activate_conn(conn: &mut SqliteConnection, project_path: &str, id: Uuid) -> Result<()> {
	sqlx::query(
		"UPDATE todo_snapshots SET is_active = 0 WHERE project_path = ? AND is_active = 1 AND id <> ?",
	)
	.bind(project_path)
	.bind(id.hyphenated())
	.execute(&mut *conn)
	.await?;

	let result = sqlx::query("UPDATE todo_snapshots SET is_active = 1 WHERE id = ?")
		.bind(id.hyphenated())
		.execute(&mut *conn)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("snapshot {id}")));
	}

	Ok(())
}

async fn fetch_snapshot_conn(conn: &mut SqliteConnection, id: Uuid) -> Result<TodoSnapshot> {
	let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM todo_snapshots WHERE id = ?");
	let row: Option<SnapshotRow> =
		sqlx::query_as(&sql).bind(id.hyphenated()).fetch_optional(&mut *conn).await?;

	row.ok_or_else(|| Error::NotFound(format!("snapshot {id}")))?.into_snapshot()
}
