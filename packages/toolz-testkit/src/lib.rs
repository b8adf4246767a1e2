mod error;

pub use error::{Error, Result};

use std::{
	collections::BTreeMap,
	env, fs,
	path::{Path, PathBuf},
};

use uuid::Uuid;

use toolz_config::{Config, Search, Service, Session, Sqlite, Storage};

const STORE_FILE: &str = "contexts.db";

/// A throwaway store file in its own temporary directory, removed on cleanup or drop.
pub struct TestDatabase {
	dir: PathBuf,
	path: PathBuf,
	cleaned: bool,
}
impl TestDatabase {
	pub fn new() -> Result<Self> {
		let dir = env::temp_dir().join(format!("toolz_test_{}", Uuid::new_v4().simple()));

		fs::create_dir_all(&dir).map_err(|err| {
			Error::Message(format!("Failed to create test directory {}: {err}.", dir.display()))
		})?;

		let path = dir.join(STORE_FILE);

		Ok(Self { dir, path, cleaned: false })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn sqlite(&self) -> Sqlite {
		Sqlite { path: self.path.clone(), pool_max_conns: 4, busy_timeout_ms: 5_000 }
	}

	/// Service config pointing at this store, with no opinion providers and a fixed project.
	pub fn config(&self, project_path: &str) -> Config {
		Config {
			service: Service { log_level: "debug".to_string() },
			storage: Storage { sqlite: self.sqlite() },
			session: Session { project_path: Some(PathBuf::from(project_path)) },
			search: Search::default(),
			providers: BTreeMap::new(),
		}
	}

	pub fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner()
	}

	fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		match fs::remove_dir_all(&self.dir) {
			Ok(()) => {},
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
			Err(err) => return Err(err.into()),
		}

		self.cleaned = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if let Err(err) = self.cleanup_inner() {
			eprintln!("Test database cleanup failed: {err}.");
		}
	}
}
