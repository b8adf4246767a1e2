pub mod contexts;
pub mod db;
pub mod models;
pub mod schema;
pub mod snapshots;
pub mod timestamp;

mod error;

pub use error::Error;

use sqlx::{QueryBuilder, Sqlite};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Result ordering by record timestamp. Ties fall back to insertion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
	#[default]
	NewestFirst,
	OldestFirst,
}
impl Order {
	fn sql(self) -> &'static str {
		match self {
			Self::NewestFirst => " ORDER BY timestamp DESC, rowid DESC",
			Self::OldestFirst => " ORDER BY timestamp ASC, rowid ASC",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
	pub limit: u32,
	pub offset: u32,
}
impl Page {
	pub fn first(limit: u32) -> Self {
		Self { limit, offset: 0 }
	}

	pub fn next(self) -> Self {
		Self { limit: self.limit, offset: self.offset.saturating_add(self.limit) }
	}
}

/// Resume point of a newest-first keyset scan: the last row already handed out.
///
/// Rows written or deleted between batches never shift the position, unlike an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
	timestamp: String,
	rowid: i64,
}
impl Cursor {
	fn push_before<'args>(&'args self, builder: &mut QueryBuilder<'args, Sqlite>) {
		builder
			.push(" AND (timestamp, rowid) < (")
			.push_bind(self.timestamp.as_str())
			.push(", ")
			.push_bind(self.rowid)
			.push(")");
	}
}

/// One batch of a keyset scan. `next` is `None` once the scan is exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
	pub items: Vec<T>,
	pub next: Option<Cursor>,
}
