pub mod gate;
pub mod time_serde;

mod context;
mod error;
mod todo;

pub use context::{
	ContextContent, ContextDraft, ContextEntry, ContextKind, ContextMetadata, DEFAULT_CODE_PATH,
	SessionSummary,
};
pub use error::{Error, Result};
pub use todo::{SnapshotDraft, Todo, TodoSnapshot, TodoStatus};
