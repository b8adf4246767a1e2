use std::sync::Arc;

use rmcp::{
	ErrorData, RoleServer, ServerHandler,
	handler::server::router::tool::ToolRouter,
	model::{
		AnnotateAble, CallToolResult, JsonObject, ListResourcesResult, PaginatedRequestParam,
		RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
		ServerCapabilities, ServerInfo,
	},
	service::RequestContext,
};

use toolz_service::{
	ListContextsRequest, ListSessionsRequest, ListSnapshotsRequest, RestoreSnapshotRequest,
	ToolzService,
};

use crate::envelope::{self, arguments};

pub const TOOL_CONTEXT_SAVE: &str = "context_save";
pub const TOOL_CONTEXT_GET: &str = "context_get";
pub const TOOL_CONTEXT_LIST: &str = "context_list";
pub const TOOL_CONTEXT_SEARCH: &str = "context_search";
pub const TOOL_CONTEXT_DELETE: &str = "context_delete";
pub const TOOL_CONTEXT_ASK: &str = "context_ask";
pub const TOOL_TODO_SAVE: &str = "todo_save";
pub const TOOL_TODO_RESTORE: &str = "todo_restore";
pub const TOOL_TODO_GET: &str = "todo_get";
pub const TOOL_TODO_LIST: &str = "todo_list";
pub const TOOL_TODO_SEARCH: &str = "todo_search";
pub const TOOL_TODO_DELETE: &str = "todo_delete";
pub const TOOL_SESSION_LIST: &str = "session_list";

pub const RESOURCE_RECENT_CONTEXTS: &str = "toolz://contexts/project/recent";
pub const RESOURCE_PROJECT_SESSIONS: &str = "toolz://contexts/project/sessions";
pub const RESOURCE_SESSION_PREFIX: &str = "toolz://contexts/session/";
pub const RESOURCE_RECENT_TODOS: &str = "toolz://todos/recent";
pub const RESOURCE_ACTIVE_TODOS: &str = "toolz://todos/active";

/// Records shown by the "recent" resources.
const RECENT_LIMIT: u32 = 20;
const JSON_MIME: &str = "application/json";

#[derive(Clone)]
pub struct ToolzMcp {
	service: Arc<ToolzService>,
	tool_router: ToolRouter<Self>,
}
impl ToolzMcp {
	pub fn new(service: Arc<ToolzService>) -> Self {
		Self { service, tool_router: Self::tool_router() }
	}

	pub fn tool_names(&self) -> Vec<String> {
		self.tool_router.list_all().into_iter().map(|tool| tool.name.to_string()).collect()
	}

	pub fn resources() -> Vec<Resource> {
		[
			(RESOURCE_RECENT_CONTEXTS, "recent-contexts", "Newest contexts of the current project."),
			(RESOURCE_PROJECT_SESSIONS, "project-sessions", "Recent sessions of the current project."),
			(RESOURCE_RECENT_TODOS, "recent-todos", "Newest todo snapshots across projects."),
			(RESOURCE_ACTIVE_TODOS, "active-todos", "Active todo snapshot of the current project."),
		]
		.into_iter()
		.map(|(uri, name, description)| {
			let mut raw = RawResource::new(uri, name);

			raw.description = Some(description.to_string());
			raw.mime_type = Some(JSON_MIME.to_string());

			raw.no_annotation()
		})
		.collect()
	}

	/// Reads one resource. `toolz://contexts/session/{session_id}` lists a session oldest first.
	pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
		tracing::debug!(uri, "Reading resource.");

		let text = match uri {
			RESOURCE_RECENT_CONTEXTS => envelope::render(self.recent_contexts().await)?,
			RESOURCE_PROJECT_SESSIONS => envelope::render(
				self.service.list_sessions(ListSessionsRequest::default()).await,
			)?,
			RESOURCE_RECENT_TODOS => envelope::render(
				self.service
					.list_snapshots(ListSnapshotsRequest {
						limit: Some(RECENT_LIMIT),
						..Default::default()
					})
					.await,
			)?,
			RESOURCE_ACTIVE_TODOS => envelope::render(
				self.service.restore_snapshot(RestoreSnapshotRequest::default()).await,
			)?,
			_ => match uri.strip_prefix(RESOURCE_SESSION_PREFIX) {
				Some(session_id) if !session_id.trim().is_empty() =>
					envelope::render(self.session_contexts(session_id).await)?,
				_ =>
					return Err(ErrorData::resource_not_found(
						format!("Unknown resource {uri}."),
						None,
					)),
			},
		};

		Ok(ReadResourceResult { contents: vec![ResourceContents::text(text, uri)] })
	}

	async fn recent_contexts(&self) -> toolz_service::Result<toolz_service::ContextListResponse> {
		let project_path = self.service.session.default_project()?;

		self.service
			.list_contexts(ListContextsRequest {
				project_path: Some(project_path),
				limit: Some(RECENT_LIMIT),
				..Default::default()
			})
			.await
	}

	async fn session_contexts(
		&self,
		session_id: &str,
	) -> toolz_service::Result<toolz_service::ContextListResponse> {
		self.service
			.list_contexts(ListContextsRequest {
				session_id: Some(session_id.to_string()),
				limit: Some(self.service.cfg.search.max_limit),
				oldest_first: true,
				..Default::default()
			})
			.await
	}
}

#[rmcp::tool_router]
impl ToolzMcp {
	#[rmcp::tool(
		name = "context_save",
		description = "Save a context (conversation, code, suggestion or error) for the current project and session.",
		input_schema = context_save_schema()
	)]
	pub async fn context_save(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.save_context(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "context_get",
		description = "Fetch a single context by context_id, including stored provider answers.",
		input_schema = context_id_schema()
	)]
	pub async fn context_get(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.get_context(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "context_list",
		description = "List contexts newest first, optionally filtered by kind, project, any of several tags, session, branch or time window.",
		input_schema = context_list_schema()
	)]
	pub async fn context_list(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.list_contexts(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "context_search",
		description = "Search contexts by text. Matches a phrase anywhere, or every word as a whole word. Newest first.",
		input_schema = context_search_schema()
	)]
	pub async fn context_search(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.search_contexts(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "context_delete",
		description = "Delete a context by context_id.",
		input_schema = context_id_schema()
	)]
	pub async fn context_delete(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.delete_context(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "context_ask",
		description = "Ask a configured AI provider for an opinion on a context. The first answer per provider is stored.",
		input_schema = context_ask_schema()
	)]
	pub async fn context_ask(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.ask_provider(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "todo_save",
		description = "Save a todo snapshot and make it the active snapshot of its project.",
		input_schema = todo_save_schema()
	)]
	pub async fn todo_save(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.save_snapshot(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "todo_restore",
		description = "Return the active todo snapshot of a project, or a snapshot by snapshot_id. Set activate to make it active.",
		input_schema = todo_restore_schema()
	)]
	pub async fn todo_restore(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.restore_snapshot(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "todo_get",
		description = "Fetch a single todo snapshot by snapshot_id.",
		input_schema = snapshot_id_schema()
	)]
	pub async fn todo_get(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.get_snapshot(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "todo_list",
		description = "List todo snapshots newest first, optionally filtered by project, branch or time window.",
		input_schema = todo_list_schema()
	)]
	pub async fn todo_list(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.list_snapshots(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "todo_search",
		description = "Search todo snapshots by todo text and snapshot context. Newest first.",
		input_schema = todo_search_schema()
	)]
	pub async fn todo_search(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.search_snapshots(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "todo_delete",
		description = "Delete a todo snapshot by snapshot_id. Deleting the active one leaves the project without an active snapshot.",
		input_schema = snapshot_id_schema()
	)]
	pub async fn todo_delete(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.delete_snapshot(arguments(params)?).await }.await)
	}

	#[rmcp::tool(
		name = "session_list",
		description = "List recent sessions of a project with their context counts.",
		input_schema = session_list_schema()
	)]
	pub async fn session_list(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		envelope::respond(async { self.service.list_sessions(arguments(params)?).await }.await)
	}
}

#[rmcp::tool_handler]
impl ServerHandler for ToolzMcp {
	fn get_info(&self) -> ServerInfo {
		ServerInfo {
			instructions: Some(
				"Project-scoped context notes and todo snapshots. Every result is an envelope: {ok, data} or {ok, kind, message}."
					.to_string(),
			),
			capabilities: ServerCapabilities::builder().enable_tools().enable_resources().build(),
			..Default::default()
		}
	}

	async fn list_resources(
		&self,
		_request: Option<PaginatedRequestParam>,
		_context: RequestContext<RoleServer>,
	) -> Result<ListResourcesResult, ErrorData> {
		Ok(ListResourcesResult::with_all_items(Self::resources()))
	}

	async fn read_resource(
		&self,
		request: ReadResourceRequestParam,
		_context: RequestContext<RoleServer>,
	) -> Result<ReadResourceResult, ErrorData> {
		self.read(&request.uri).await
	}
}

fn context_save_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["kind", "title", "content"],
		"properties": {
			"kind": { "type": "string", "enum": ["conversation", "code", "suggestion", "error"] },
			"title": { "type": "string" },
			"content": {
				"description": "Plain text, or a structured payload tagged with the same kind.",
				"oneOf": [
					{ "type": "string" },
					{
						"type": "object",
						"required": ["kind"],
						"properties": {
							"kind": { "type": "string" },
							"messages": { "type": "array", "items": { "type": "string" } },
							"files": { "type": "object", "additionalProperties": { "type": "string" } },
							"text": { "type": "string" }
						}
					}
				]
			},
			"file_path": { "type": ["string", "null"] },
			"tags": { "type": "array", "items": { "type": "string" } },
			"project_path": { "type": ["string", "null"] },
			"linked_context_id": { "type": ["string", "null"], "format": "uuid" }
		}
	}))
}

fn context_id_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["context_id"],
		"properties": {
			"context_id": { "type": "string", "format": "uuid" }
		}
	}))
}

fn context_list_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"kind": { "type": ["string", "null"], "enum": ["conversation", "code", "suggestion", "error", null] },
			"project_path": { "type": ["string", "null"] },
			"tags": { "type": "array", "items": { "type": "string" }, "description": "Match any of these tags." },
			"session_id": { "type": ["string", "null"] },
			"git_branch": { "type": ["string", "null"] },
			"since": { "type": ["string", "null"], "format": "date-time" },
			"until": { "type": ["string", "null"], "format": "date-time" },
			"limit": { "type": ["integer", "null"], "minimum": 1 },
			"offset": { "type": "integer", "minimum": 0 },
			"oldest_first": { "type": "boolean" }
		}
	}))
}

fn context_search_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"query": { "type": "string" },
			"kind": { "type": ["string", "null"], "enum": ["conversation", "code", "suggestion", "error", null] },
			"project_path": { "type": ["string", "null"] },
			"tags": { "type": "array", "items": { "type": "string" }, "description": "Match any of these tags." },
			"session_id": { "type": ["string", "null"] },
			"git_branch": { "type": ["string", "null"] },
			"since": { "type": ["string", "null"], "format": "date-time" },
			"until": { "type": ["string", "null"], "format": "date-time" },
			"limit": { "type": ["integer", "null"], "minimum": 1 }
		}
	}))
}

fn context_ask_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["context_id", "provider"],
		"properties": {
			"context_id": { "type": "string", "format": "uuid" },
			"provider": { "type": "string" },
			"question": { "type": ["string", "null"] }
		}
	}))
}

fn todo_save_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["todos"],
		"properties": {
			"todos": {
				"type": "array",
				"items": {
					"type": "object",
					"additionalProperties": false,
					"required": ["content", "status", "activeForm"],
					"properties": {
						"content": { "type": "string" },
						"status": { "type": "string", "enum": ["pending", "in_progress", "completed"] },
						"activeForm": { "type": "string" }
					}
				}
			},
			"project_path": { "type": ["string", "null"] },
			"git_branch": { "type": ["string", "null"] },
			"context": { "type": ["string", "null"] },
			"linked_context_id": { "type": ["string", "null"], "format": "uuid" },
			"metadata": { "type": "object", "additionalProperties": true }
		}
	}))
}

fn todo_restore_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"snapshot_id": { "type": ["string", "null"], "format": "uuid" },
			"project_path": { "type": ["string", "null"] },
			"activate": { "type": "boolean" }
		}
	}))
}

fn snapshot_id_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["snapshot_id"],
		"properties": {
			"snapshot_id": { "type": "string", "format": "uuid" }
		}
	}))
}

fn todo_list_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"project_path": { "type": ["string", "null"] },
			"git_branch": { "type": ["string", "null"] },
			"since": { "type": ["string", "null"], "format": "date-time" },
			"until": { "type": ["string", "null"], "format": "date-time" },
			"limit": { "type": ["integer", "null"], "minimum": 1 },
			"offset": { "type": "integer", "minimum": 0 }
		}
	}))
}

fn todo_search_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"query": { "type": "string" },
			"project_path": { "type": ["string", "null"] },
			"git_branch": { "type": ["string", "null"] },
			"since": { "type": ["string", "null"], "format": "date-time" },
			"until": { "type": ["string", "null"], "format": "date-time" },
			"limit": { "type": ["integer", "null"], "minimum": 1 }
		}
	}))
}

fn session_list_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"properties": {
			"project_path": { "type": ["string", "null"] },
			"limit": { "type": ["integer", "null"], "minimum": 1 }
		}
	}))
}
