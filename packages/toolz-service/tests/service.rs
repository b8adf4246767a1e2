use std::{
	path::Path,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::Map;

use toolz_config::{Config, ProviderConfig, ProviderDialect};
use toolz_domain::{ContextContent, ContextKind, Todo, TodoStatus};
use toolz_service::{
	AskProviderRequest, BoxFuture, DeleteContextRequest, DeleteSnapshotRequest, Error,
	GetContextRequest, GetSnapshotRequest, GitBranchLookup, ListContextsRequest,
	ListSessionsRequest, ListSnapshotsRequest, OpinionProvider, Providers, RestoreSnapshotRequest,
	SaveContextRequest, SaveSnapshotRequest, SearchContextsRequest, SearchSnapshotsRequest,
	SessionResolver, ToolzService, contexts::ContentInput,
};
use toolz_storage::db::Db;
use toolz_testkit::TestDatabase;

const PROJECT: &str = "/work/alpha";

struct FixedBranch;
impl GitBranchLookup for FixedBranch {
	fn current_branch<'a>(&'a self, _project_path: &'a Path) -> BoxFuture<'a, Option<String>> {
		Box::pin(async move { Some("main".to_string()) })
	}
}

struct SpyProvider {
	calls: Arc<AtomicUsize>,
}
impl SpyProvider {
	fn new() -> Self {
		Self { calls: Arc::new(AtomicUsize::new(0)) }
	}
}
impl OpinionProvider for SpyProvider {
	fn ask<'a>(
		&'a self,
		name: &'a str,
		_cfg: &'a ProviderConfig,
		_system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, toolz_providers::Result<String>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(format!("{name} answer #{call} on {} chars", user.len())) })
	}
}

struct FailingProvider;
impl OpinionProvider for FailingProvider {
	fn ask<'a>(
		&'a self,
		_name: &'a str,
		_cfg: &'a ProviderConfig,
		_system: &'a str,
		_user: &'a str,
	) -> BoxFuture<'a, toolz_providers::Result<String>> {
		Box::pin(async move {
			Err(toolz_providers::Error::InvalidResponse { message: "upstream said no".to_string() })
		})
	}
}

fn provider_config() -> ProviderConfig {
	ProviderConfig {
		dialect: ProviderDialect::OpenAi,
		api_base: "http://127.0.0.1:9".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "test-model".to_string(),
		api_key: Some("test-key".to_string()),
		api_key_env: None,
		temperature: 0.2,
		max_tokens: 256,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

fn test_config(test_db: &TestDatabase) -> Config {
	let mut cfg = test_db.config(PROJECT);

	cfg.providers.insert("chatgpt".to_string(), provider_config());
	cfg.providers.insert("claude".to_string(), provider_config());

	cfg
}

async fn build_service(test_db: &TestDatabase, opinion: Arc<dyn OpinionProvider>) -> ToolzService {
	let cfg = test_config(test_db);
	let db = Db::connect(&cfg.storage.sqlite).await.expect("Failed to open store.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let session = SessionResolver::new(&cfg.session, Arc::new(FixedBranch));

	ToolzService::with_parts(cfg, db, session, Providers::new(opinion))
}

fn save_request(kind: ContextKind, title: &str, content: &str, tags: &[&str]) -> SaveContextRequest {
	SaveContextRequest {
		kind,
		title: title.to_string(),
		content: ContentInput::Text(content.to_string()),
		file_path: None,
		tags: tags.iter().map(|tag| tag.to_string()).collect(),
		project_path: None,
		linked_context_id: None,
	}
}

fn todo(content: &str, status: TodoStatus, active_form: &str) -> Todo {
	Todo { content: content.to_string(), status, active_form: active_form.to_string() }
}

fn snapshot_request(todos: Vec<Todo>, project_path: Option<&str>) -> SaveSnapshotRequest {
	SaveSnapshotRequest {
		todos,
		project_path: project_path.map(str::to_string),
		git_branch: None,
		context: Some("Login flow".to_string()),
		linked_context_id: None,
		metadata: Map::new(),
	}
}

async fn context_count(service: &ToolzService) -> usize {
	service
		.list_contexts(ListContextsRequest { limit: Some(200), ..Default::default() })
		.await
		.expect("Failed to list contexts.")
		.items
		.len()
}

async fn snapshot_count(service: &ToolzService) -> usize {
	service
		.list_snapshots(ListSnapshotsRequest { limit: Some(200), ..Default::default() })
		.await
		.expect("Failed to list snapshots.")
		.items
		.len()
}

#[tokio::test]
async fn saved_context_carries_session_tags_and_reads_back_identically() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let saved = service
		.save_context(save_request(
			ContextKind::Error,
			"  Login fails  ",
			"OAuth token expired",
			&["auth", " bug ", "auth"],
		))
		.await
		.expect("Failed to save context.")
		.context;

	assert_eq!(saved.title, "  Login fails  ");
	assert_eq!(saved.tags, vec!["auth".to_string(), "bug".to_string()]);
	assert_eq!(saved.metadata.project_path, PROJECT);
	assert_eq!(saved.metadata.git_branch.as_deref(), Some("main"));
	assert_eq!(saved.metadata.session_id.as_deref(), Some(service.session.session_id()));
	assert_eq!(saved.metadata.session_started_at, Some(service.session.session_started_at()));
	assert!(saved.ai_responses.is_empty());

	let loaded = service
		.get_context(GetContextRequest { context_id: saved.id })
		.await
		.expect("Failed to load context.")
		.context;

	assert_eq!(loaded, saved);
}

#[tokio::test]
async fn structured_content_must_agree_with_kind() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let mut req = save_request(ContextKind::Error, "Mismatch", "", &[]);

	req.content = ContentInput::Structured(ContextContent::Suggestion { text: "Try again".to_string() });

	let result = service.save_context(req).await;

	assert!(matches!(result, Err(Error::Validation { .. })));
	assert_eq!(context_count(&service).await, 0);
}

#[tokio::test]
async fn invalid_context_writes_nothing() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let blank_title = service.save_context(save_request(ContextKind::Error, "   ", "boom", &[])).await;
	let blank_content =
		service.save_context(save_request(ContextKind::Suggestion, "Idea", "  ", &[])).await;
	let blank_tag =
		service.save_context(save_request(ContextKind::Error, "Boom", "boom", &["ok", " "])).await;

	assert!(matches!(blank_title, Err(Error::Validation { .. })));
	assert!(matches!(blank_content, Err(Error::Validation { .. })));
	assert!(matches!(blank_tag, Err(Error::Validation { .. })));
	assert_eq!(context_count(&service).await, 0);
}

#[tokio::test]
async fn missing_context_is_not_found_and_delete_reports_false() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let saved = service
		.save_context(save_request(ContextKind::Suggestion, "Cache", "Cache the token", &[]))
		.await
		.expect("Failed to save context.")
		.context;
	let deleted = service
		.delete_context(DeleteContextRequest { context_id: saved.id })
		.await
		.expect("Failed to delete context.");

	assert!(deleted.deleted);

	let again = service
		.delete_context(DeleteContextRequest { context_id: saved.id })
		.await
		.expect("Failed to delete context.");

	assert!(!again.deleted);
	assert!(matches!(
		service.get_context(GetContextRequest { context_id: saved.id }).await,
		Err(Error::NotFound { .. })
	));
}

#[tokio::test]
async fn search_respects_kind_filter_and_recency() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let older = service
		.save_context(save_request(ContextKind::Error, "Login fails", "OAuth token expired", &[]))
		.await
		.expect("Failed to save context.")
		.context;

	service
		.save_context(save_request(ContextKind::Suggestion, "Auth idea", "Refresh tokens early", &[]))
		.await
		.expect("Failed to save context.");

	let newer = service
		.save_context(save_request(ContextKind::Error, "Crash", "Panic in parser", &["auth"]))
		.await
		.expect("Failed to save context.")
		.context;

	service
		.save_context(save_request(ContextKind::Error, "Disk", "No space left", &[]))
		.await
		.expect("Failed to save context.");

	let found = service
		.search_contexts(SearchContextsRequest {
			query: "auth".to_string(),
			kind: Some(ContextKind::Error),
			..Default::default()
		})
		.await
		.expect("Failed to search contexts.");

	assert_eq!(found.items.iter().map(|entry| entry.id).collect::<Vec<_>>(), vec![
		newer.id, older.id
	]);
}

#[tokio::test]
async fn tag_filters_match_any_listed_tag() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let auth = service
		.save_context(save_request(ContextKind::Error, "Login fails", "Token expired", &["auth"]))
		.await
		.expect("Failed to save context.")
		.context;
	let db = service
		.save_context(save_request(ContextKind::Error, "Disk full", "No space left", &["db"]))
		.await
		.expect("Failed to save context.")
		.context;

	service
		.save_context(save_request(ContextKind::Error, "Crash", "Panic in parser", &["parser"]))
		.await
		.expect("Failed to save context.");

	let listed = service
		.list_contexts(ListContextsRequest {
			tags: vec!["auth".to_string(), "db".to_string()],
			..Default::default()
		})
		.await
		.expect("Failed to list contexts.");

	assert_eq!(listed.items.iter().map(|entry| entry.id).collect::<Vec<_>>(), vec![db.id, auth.id]);

	let found = service
		.search_contexts(SearchContextsRequest {
			query: "expired".to_string(),
			tags: vec!["db".to_string(), " auth ".to_string()],
			..Default::default()
		})
		.await
		.expect("Failed to search contexts.");

	assert_eq!(found.items.iter().map(|entry| entry.id).collect::<Vec<_>>(), vec![auth.id]);

	let blank = service
		.search_contexts(SearchContextsRequest { tags: vec!["  ".to_string()], ..Default::default() })
		.await;

	assert!(matches!(blank, Err(Error::Validation { .. })));
}

#[tokio::test]
async fn multi_word_query_matches_whole_words_across_fields() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let hit = service
		.save_context(save_request(ContextKind::Error, "Parser crash", "Stack overflow", &["rust"]))
		.await
		.expect("Failed to save context.")
		.context;

	service
		.save_context(save_request(ContextKind::Error, "Parsers", "crashes", &[]))
		.await
		.expect("Failed to save context.");

	let found = service
		.search_contexts(SearchContextsRequest {
			query: "rust overflow".to_string(),
			..Default::default()
		})
		.await
		.expect("Failed to search contexts.");

	assert_eq!(found.items.iter().map(|entry| entry.id).collect::<Vec<_>>(), vec![hit.id]);
}

#[tokio::test]
async fn limit_outside_bounds_is_rejected() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let zero = service
		.search_contexts(SearchContextsRequest { limit: Some(0), ..Default::default() })
		.await;
	let huge = service
		.list_snapshots(ListSnapshotsRequest { limit: Some(10_000), ..Default::default() })
		.await;

	assert!(matches!(zero, Err(Error::Validation { .. })));
	assert!(matches!(huge, Err(Error::Validation { .. })));
}

#[tokio::test]
async fn saving_snapshots_moves_the_active_marker() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let first = service
		.save_snapshot(snapshot_request(
			vec![todo("Write login", TodoStatus::InProgress, "Writing login")],
			None,
		))
		.await
		.expect("Failed to save snapshot.")
		.snapshot;

	assert!(first.is_active);
	assert_eq!(first.git_branch.as_deref(), Some("main"));
	assert_eq!(
		first.metadata.get("session_id").and_then(|value| value.as_str()),
		Some(service.session.session_id())
	);

	let second = service
		.save_snapshot(snapshot_request(
			vec![
				todo("Write login", TodoStatus::Completed, "Writing login"),
				todo("Write tests", TodoStatus::Pending, "Writing tests"),
			],
			None,
		))
		.await
		.expect("Failed to save snapshot.")
		.snapshot;
	let restored = service
		.restore_snapshot(RestoreSnapshotRequest::default())
		.await
		.expect("Failed to restore snapshot.")
		.snapshot;

	assert_eq!(restored.id, second.id);
	assert_eq!(restored.todos, second.todos);
	assert_eq!(restored.todos.len(), 2);

	let first = service
		.get_snapshot(GetSnapshotRequest { snapshot_id: first.id })
		.await
		.expect("Failed to load snapshot.")
		.snapshot;

	assert!(!first.is_active);

	let reactivated = service
		.restore_snapshot(RestoreSnapshotRequest {
			snapshot_id: Some(first.id),
			project_path: None,
			activate: true,
		})
		.await
		.expect("Failed to activate snapshot.")
		.snapshot;

	assert!(reactivated.is_active);

	let active = service
		.restore_snapshot(RestoreSnapshotRequest::default())
		.await
		.expect("Failed to restore snapshot.")
		.snapshot;

	assert_eq!(active.id, first.id);
}

#[tokio::test]
async fn projects_keep_separate_active_snapshots() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let alpha = service
		.save_snapshot(snapshot_request(vec![todo("A", TodoStatus::Pending, "Doing A")], None))
		.await
		.expect("Failed to save snapshot.")
		.snapshot;
	let beta = service
		.save_snapshot(snapshot_request(
			vec![todo("B", TodoStatus::Pending, "Doing B")],
			Some("/work/beta"),
		))
		.await
		.expect("Failed to save snapshot.")
		.snapshot;
	let active_alpha = service
		.restore_snapshot(RestoreSnapshotRequest::default())
		.await
		.expect("Failed to restore snapshot.")
		.snapshot;
	let active_beta = service
		.restore_snapshot(RestoreSnapshotRequest {
			project_path: Some("/work/beta".to_string()),
			..Default::default()
		})
		.await
		.expect("Failed to restore snapshot.")
		.snapshot;

	assert_eq!(active_alpha.id, alpha.id);
	assert_eq!(active_beta.id, beta.id);
}

#[tokio::test]
async fn deleting_the_active_snapshot_leaves_nothing_to_restore() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let saved = service
		.save_snapshot(snapshot_request(Vec::new(), None))
		.await
		.expect("Failed to save snapshot.")
		.snapshot;
	let deleted = service
		.delete_snapshot(DeleteSnapshotRequest { snapshot_id: saved.id })
		.await
		.expect("Failed to delete snapshot.");

	assert!(deleted.deleted);
	assert!(matches!(
		service.restore_snapshot(RestoreSnapshotRequest::default()).await,
		Err(Error::NotFound { .. })
	));
	assert!(matches!(
		service
			.restore_snapshot(RestoreSnapshotRequest {
				snapshot_id: Some(saved.id),
				project_path: None,
				activate: true,
			})
			.await,
		Err(Error::NotFound { .. })
	));
}

#[tokio::test]
async fn invalid_snapshot_writes_nothing() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let result = service
		.save_snapshot(snapshot_request(
			vec![
				todo("Fine", TodoStatus::Pending, "Doing fine"),
				todo("  ", TodoStatus::Pending, "Doing nothing"),
			],
			None,
		))
		.await;

	assert!(matches!(&result, Err(Error::Validation { message }) if message.contains("todos[1]")));
	assert_eq!(snapshot_count(&service).await, 0);

	let unknown_status = serde_json::from_value::<SaveSnapshotRequest>(serde_json::json!({
		"todos": [{ "content": "X", "status": "blocked", "activeForm": "Doing X" }]
	}));

	assert!(unknown_status.is_err());
}

#[tokio::test]
async fn snapshot_search_matches_todo_text() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;
	let hit = service
		.save_snapshot(snapshot_request(
			vec![todo("Migrate schema", TodoStatus::InProgress, "Migrating schema")],
			None,
		))
		.await
		.expect("Failed to save snapshot.")
		.snapshot;

	service
		.save_snapshot(snapshot_request(vec![todo("Ship", TodoStatus::Pending, "Shipping")], None))
		.await
		.expect("Failed to save snapshot.");

	let found = service
		.search_snapshots(SearchSnapshotsRequest {
			query: "migrating".to_string(),
			..Default::default()
		})
		.await
		.expect("Failed to search snapshots.");

	assert_eq!(found.items.iter().map(|snapshot| snapshot.id).collect::<Vec<_>>(), vec![hit.id]);
}

#[tokio::test]
async fn provider_answers_accumulate_and_the_first_one_is_kept() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let spy = SpyProvider::new();
	let calls = spy.calls.clone();
	let service = build_service(&test_db, Arc::new(spy)).await;
	let saved = service
		.save_context(save_request(ContextKind::Error, "Login fails", "OAuth token expired", &[]))
		.await
		.expect("Failed to save context.")
		.context;
	let ask = |provider: &str| AskProviderRequest {
		context_id: saved.id,
		provider: provider.to_string(),
		question: None,
	};
	let first = service.ask_provider(ask("chatgpt")).await.expect("Failed to ask provider.");
	let second = service.ask_provider(ask("claude")).await.expect("Failed to ask provider.");
	let repeat = service.ask_provider(ask("chatgpt")).await.expect("Failed to ask provider.");

	assert!(first.stored);
	assert!(second.stored);
	assert!(!repeat.stored);
	assert!(repeat.answer.is_some());
	assert_eq!(calls.load(Ordering::SeqCst), 3);

	let loaded = service
		.get_context(GetContextRequest { context_id: saved.id })
		.await
		.expect("Failed to load context.")
		.context;

	assert_eq!(loaded.ai_responses.len(), 2);
	assert_eq!(loaded.ai_responses.get("chatgpt"), first.answer.as_ref());
	assert_eq!(loaded.ai_responses.get("claude"), second.answer.as_ref());
}

#[tokio::test]
async fn provider_failure_is_reported_without_storing() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(FailingProvider)).await;
	let saved = service
		.save_context(save_request(ContextKind::Error, "Login fails", "OAuth token expired", &[]))
		.await
		.expect("Failed to save context.")
		.context;
	let response = service
		.ask_provider(AskProviderRequest {
			context_id: saved.id,
			provider: "claude".to_string(),
			question: Some("Why?".to_string()),
		})
		.await
		.expect("Provider failure should not fail the call.");

	assert!(response.answer.is_none());
	assert!(!response.stored);
	assert!(response.error.as_deref().is_some_and(|error| error.contains("upstream said no")));

	let loaded = service
		.get_context(GetContextRequest { context_id: saved.id })
		.await
		.expect("Failed to load context.")
		.context;

	assert!(loaded.ai_responses.is_empty());
}

#[tokio::test]
async fn unknown_provider_and_missing_context_are_rejected_before_calling_out() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let spy = SpyProvider::new();
	let calls = spy.calls.clone();
	let service = build_service(&test_db, Arc::new(spy)).await;
	let saved = service
		.save_context(save_request(ContextKind::Error, "Login fails", "OAuth token expired", &[]))
		.await
		.expect("Failed to save context.")
		.context;
	let unknown = service
		.ask_provider(AskProviderRequest {
			context_id: saved.id,
			provider: "oracle".to_string(),
			question: None,
		})
		.await;

	assert!(
		matches!(&unknown, Err(Error::Validation { message }) if message.contains("chatgpt"))
	);

	let missing = service
		.ask_provider(AskProviderRequest {
			context_id: uuid::Uuid::new_v4(),
			provider: "chatgpt".to_string(),
			question: None,
		})
		.await;

	assert!(matches!(missing, Err(Error::NotFound { .. })));
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sessions_group_contexts_of_the_project() {
	let test_db = TestDatabase::new().expect("Failed to create test database.");
	let service = build_service(&test_db, Arc::new(SpyProvider::new())).await;

	for title in ["One", "Two", "Three"] {
		service
			.save_context(save_request(ContextKind::Suggestion, title, "Body", &[]))
			.await
			.expect("Failed to save context.");
	}

	let mut elsewhere = save_request(ContextKind::Suggestion, "Other", "Body", &[]);

	elsewhere.project_path = Some("/work/beta".to_string());

	service.save_context(elsewhere).await.expect("Failed to save context.");

	let listed = service
		.list_sessions(ListSessionsRequest::default())
		.await
		.expect("Failed to list sessions.");

	assert_eq!(listed.project_path, PROJECT);
	assert_eq!(listed.sessions.len(), 1);
	assert_eq!(listed.sessions[0].session_id, service.session.session_id());
	assert_eq!(listed.sessions[0].context_count, 3);
}
