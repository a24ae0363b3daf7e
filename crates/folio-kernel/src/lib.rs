//! SQLite-backed storage for the folio admin backend.
//!
//! [`Kernel`] owns nothing but the database location; every operation opens
//! its own connection so the handle can be cloned into each request handler.
//! The services hanging off it ([`SchemaManager`], [`SettingsStore`],
//! [`ActivityLogger`]) are thin views over the same handle.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod activity;
pub mod catalog;
pub mod error;
pub mod schema;
pub mod settings;

pub use activity::{ActivityEntry, ActivityLogger, ActivityRecord, AuditOutcome};
pub use catalog::CATALOG;
pub use error::{StoreError, StoreResult};
pub use schema::{ColumnStep, SchemaCatalog, SchemaManager, SchemaReport, TableSpec};
pub use settings::{
    default_settings, validate_key, SetManyOutcome, SettingValue, SettingsSnapshot,
    SettingsStore, DEFAULT_SETTINGS,
};

pub const DB_FILE_NAME: &str = "folio.sqlite";
pub const DEFAULT_BUSY_MS: u64 = 5000;

#[derive(Clone, Debug)]
pub struct Kernel {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl Kernel {
    /// Open `folio.sqlite` inside `dir`, creating the directory when needed.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open_file(&dir.join(DB_FILE_NAME), busy_ms_from_env())
    }

    pub fn open_file(db_path: &Path, busy_ms: u64) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let kernel = Self {
            db_path: db_path.to_path_buf(),
            busy_timeout: Duration::from_millis(busy_ms),
        };
        let conn = kernel.conn()?;
        // Pragmas tuned for many short-lived connections from async handlers
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let _ = conn.pragma_update(None, "temp_store", "MEMORY");
        tracing::debug!(
            target: "folio::kernel",
            path = %kernel.db_path.display(),
            busy_ms,
            "opened settings database"
        );
        Ok(kernel)
    }

    pub(crate) fn conn(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn schema(&self) -> SchemaManager {
        SchemaManager::new(self.clone())
    }

    pub fn settings(&self) -> SettingsStore {
        SettingsStore::new(self.clone())
    }

    pub fn activity(&self) -> ActivityLogger {
        ActivityLogger::new(self.clone())
    }
}

fn busy_ms_from_env() -> u64 {
    std::env::var("FOLIO_SQLITE_BUSY_MS")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_BUSY_MS)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Kernel;
    use tempfile::TempDir;

    pub(crate) fn kernel() -> (TempDir, Kernel) {
        let dir = tempfile::tempdir().expect("tempdir");
        let kernel = Kernel::open_file(&dir.path().join("test.sqlite"), 1000).expect("open kernel");
        (dir, kernel)
    }

    pub(crate) fn migrated_kernel() -> (TempDir, Kernel) {
        let (dir, kernel) = kernel();
        kernel
            .schema()
            .apply(&crate::CATALOG)
            .expect("apply catalog");
        (dir, kernel)
    }
}
