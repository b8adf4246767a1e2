use std::{fs, path::Path, time::Duration};

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::{Result, schema};

/// Path fragments of folders kept in sync by desktop cloud clients. WAL side files do not survive
/// their replication, so stores inside them use rollback journaling.
const CLOUD_SYNC_MARKERS: [&str; 6] = [
	"/Dropbox/",
	"/Google Drive/",
	"/OneDrive/",
	"/iCloud Drive/",
	"Library/Mobile Documents/",
	"/Box/",
];

pub struct Db {
	pub pool: SqlitePool,
}
impl Db {
	pub async fn connect(cfg: &toolz_config::Sqlite) -> Result<Self> {
		if let Some(parent) = cfg.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}

		let journal_mode = journal_mode_for(&cfg.path);
		let options = SqliteConnectOptions::new()
			.filename(&cfg.path)
			.create_if_missing(true)
			.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))
			.journal_mode(journal_mode);
		let pool = SqlitePoolOptions::new()
			.max_connections(cfg.pool_max_conns)
			.connect_with(options)
			.await?;

		tracing::debug!(path = %cfg.path.display(), ?journal_mode, "Opened context store.");

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		let mut tx = self.pool.begin().await?;

		for statement in schema::statements(&sql) {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}

pub fn is_cloud_synced(path: &Path) -> bool {
	let raw = path.to_string_lossy().replace('\\', "/");

	CLOUD_SYNC_MARKERS.iter().any(|marker| raw.contains(marker))
}

fn journal_mode_for(path: &Path) -> SqliteJournalMode {
	if is_cloud_synced(path) { SqliteJournalMode::Delete } else { SqliteJournalMode::Wal }
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use super::*;

	#[test]
	fn detects_cloud_synced_folders() {
		assert!(is_cloud_synced(Path::new("/Users/a/Dropbox/notes/contexts.db")));
		assert!(is_cloud_synced(Path::new("/Users/a/Library/Mobile Documents/com~apple/x.db")));
		assert!(!is_cloud_synced(Path::new("/home/a/.toolz/contexts.db")));
	}

	#[test]
	fn picks_rollback_journal_for_synced_paths() {
		assert!(matches!(
			journal_mode_for(Path::new("/home/a/OneDrive/c.db")),
			SqliteJournalMode::Delete
		));
		assert!(matches!(journal_mode_for(Path::new("/tmp/c.db")), SqliteJournalMode::Wal));
	}
}
