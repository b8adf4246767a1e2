use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use toolz_domain::{SnapshotDraft, Todo, TodoSnapshot, gate};
use toolz_storage::{
	Order, Page,
	snapshots::{self, SnapshotFilter},
	timestamp,
};

use crate::{DeleteResponse, Result, ToolzService};

/// Snapshot metadata key recording the session that saved it.
pub const SESSION_ID_KEY: &str = "session_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveSnapshotRequest {
	pub todos: Vec<Todo>,
	pub project_path: Option<String>,
	/// Overrides the detected branch.
	pub git_branch: Option<String>,
	pub context: Option<String>,
	pub linked_context_id: Option<Uuid>,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}

/// Reads the active snapshot of a project, or a specific snapshot when `snapshot_id` is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreSnapshotRequest {
	pub snapshot_id: Option<Uuid>,
	pub project_path: Option<String>,
	/// Also make the requested snapshot the active one of its project.
	#[serde(default)]
	pub activate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetSnapshotRequest {
	pub snapshot_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteSnapshotRequest {
	pub snapshot_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListSnapshotsRequest {
	pub project_path: Option<String>,
	pub git_branch: Option<String>,
	#[serde(default, with = "toolz_domain::time_serde::option")]
	pub since: Option<OffsetDateTime>,
	#[serde(default, with = "toolz_domain::time_serde::option")]
	pub until: Option<OffsetDateTime>,
	pub limit: Option<u32>,
	#[serde(default)]
	pub offset: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
	pub snapshot: TodoSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotListResponse {
	pub items: Vec<TodoSnapshot>,
}

impl ToolzService {
	/// Stores a snapshot and makes it the active one of its project in the same transaction.
	pub async fn save_snapshot(&self, req: SaveSnapshotRequest) -> Result<SnapshotResponse> {
		let session = self.session.resolve(req.project_path.as_deref()).await?;
		let git_branch = match crate::non_blank("git_branch", req.git_branch)? {
			Some(branch) => Some(branch.trim().to_string()),
			None => session.git_branch,
		};
		let context = req
			.context
			.map(|context| context.trim().to_string())
			.filter(|context| !context.is_empty());
		let mut metadata = req.metadata;

		metadata.insert(SESSION_ID_KEY.to_string(), Value::String(session.session_id));

		let draft = SnapshotDraft {
			project_path: session.project_path,
			git_branch,
			todos: req.todos,
			context,
			linked_context_id: req.linked_context_id,
			metadata,
		};

		gate::check_snapshot(&draft)?;

		let mut snapshot = TodoSnapshot::from_draft(Uuid::new_v4(), timestamp::now(), draft);

		snapshots::insert_snapshot_and_activate(&self.db, &snapshot).await?;

		snapshot.is_active = true;

		tracing::info!(
			snapshot_id = %snapshot.id,
			project_path = %snapshot.project_path,
			todos = snapshot.todos.len(),
			"Saved and activated todo snapshot."
		);

		Ok(SnapshotResponse { snapshot })
	}

	pub async fn restore_snapshot(&self, req: RestoreSnapshotRequest) -> Result<SnapshotResponse> {
		let snapshot = match req.snapshot_id {
			Some(id) if req.activate => {
				let snapshot = snapshots::activate(&self.db, id).await?;

				tracing::info!(
					snapshot_id = %snapshot.id,
					project_path = %snapshot.project_path,
					"Activated todo snapshot."
				);

				snapshot
			},
			Some(id) => snapshots::get_snapshot(&self.db, id).await?,
			None => {
				let project_path = self.session.project(req.project_path.as_deref())?;

				snapshots::get_active_snapshot(&self.db, &project_path).await?
			},
		};

		Ok(SnapshotResponse { snapshot })
	}

	pub async fn get_snapshot(&self, req: GetSnapshotRequest) -> Result<SnapshotResponse> {
		let snapshot = snapshots::get_snapshot(&self.db, req.snapshot_id).await?;

		Ok(SnapshotResponse { snapshot })
	}

	/// Deleting the active snapshot leaves its project with none active.
	pub async fn delete_snapshot(&self, req: DeleteSnapshotRequest) -> Result<DeleteResponse> {
		let deleted = snapshots::delete_snapshot(&self.db, req.snapshot_id).await?;

		tracing::info!(snapshot_id = %req.snapshot_id, deleted, "Deleted todo snapshot.");

		Ok(DeleteResponse { id: req.snapshot_id, deleted })
	}

	pub async fn list_snapshots(&self, req: ListSnapshotsRequest) -> Result<SnapshotListResponse> {
		let limit = self.resolve_limit(req.limit, self.cfg.search.list_limit)?;
		let filter = SnapshotFilter {
			project_path: crate::non_blank("project_path", req.project_path)?,
			git_branch: crate::non_blank("git_branch", req.git_branch)?,
			since: req.since,
			until: req.until,
		};
		let items = snapshots::list_snapshots(
			&self.db,
			&filter,
			Page { limit, offset: req.offset },
			Order::NewestFirst,
		)
		.await?;

		Ok(SnapshotListResponse { items })
	}
}
