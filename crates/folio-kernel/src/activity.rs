//! Append-only audit trail of administrative actions.
//!
//! Writes are lenient: [`ActivityLogger::record`] reports a failed append as
//! [`AuditOutcome::Dropped`] instead of an error, so the mutation that
//! triggered it can still succeed.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreResult;
use crate::catalog::ACTIVITY_TABLE;
use crate::schema::table_columns;
use crate::Kernel;

pub const DEFAULT_RECENT: i64 = 50;
pub const MAX_RECENT: i64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub actor_id: Option<i64>,
    pub actor_name: String,
    pub action: String,
    pub detail: String,
}

impl ActivityEntry {
    pub fn new(
        actor_id: Option<i64>,
        actor_name: impl Into<String>,
        action: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            actor_id,
            actor_name: actor_name.into(),
            action: action.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: i64,
    pub actor_id: Option<i64>,
    pub actor_name: String,
    pub action: String,
    pub detail: String,
    pub timestamp: String,
}

/// Result of an audit append. Never an error: a dropped entry is an
/// expected, non-fatal outcome that callers may inspect or ignore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Recorded { id: i64 },
    Dropped { reason: String },
}

impl AuditOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditOutcome::Recorded { .. })
    }
}

#[derive(Clone, Debug)]
pub struct ActivityLogger {
    kernel: Kernel,
}

impl ActivityLogger {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    pub fn record(&self, entry: &ActivityEntry) -> AuditOutcome {
        match self.append(entry) {
            Ok(id) => AuditOutcome::Recorded { id },
            Err(err) => {
                warn!(
                    target: "folio::activity",
                    actor = %entry.actor_name,
                    action = %entry.action,
                    error = %err,
                    "activity entry dropped"
                );
                AuditOutcome::Dropped {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn append(&self, entry: &ActivityEntry) -> StoreResult<i64> {
        let conn = self.kernel.conn()?;
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        conn.execute(
            "INSERT INTO activity_log(actor_id, actor_name, action, detail, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.actor_id,
                entry.actor_name,
                entry.action,
                entry.detail,
                now
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent entries, newest first. `limit` is clamped to `0..=MAX_RECENT`,
    /// so zero or a negative limit reads nothing.
    ///
    /// Rows written before the actor columns existed keep their values in the
    /// older `user_id`/`username`/`details` columns; those are read through
    /// when present.
    pub fn recent(&self, limit: i64) -> StoreResult<Vec<ActivityRecord>> {
        let conn = self.kernel.conn()?;
        let live = table_columns(&conn, ACTIVITY_TABLE)?;
        let has = |col: &str| live.iter().any(|c| c.eq_ignore_ascii_case(col));
        let actor_id = if has("user_id") {
            "COALESCE(actor_id, user_id)"
        } else {
            "actor_id"
        };
        let actor_name = if has("username") {
            "COALESCE(actor_name, username, '')"
        } else {
            "COALESCE(actor_name, '')"
        };
        let detail = if has("details") {
            "COALESCE(detail, details, '')"
        } else {
            "COALESCE(detail, '')"
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT id, {actor_id}, {actor_name}, COALESCE(action, ''),
                    {detail}, COALESCE(timestamp, '')
             FROM activity_log ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit.clamp(0, MAX_RECENT)], |r| {
                Ok(ActivityRecord {
                    id: r.get(0)?,
                    actor_id: r.get(1)?,
                    actor_name: r.get(2)?,
                    action: r.get(3)?,
                    detail: r.get(4)?,
                    timestamp: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Bulk clear. Returns the number of rows removed.
    pub fn clear(&self) -> StoreResult<usize> {
        let conn = self.kernel.conn()?;
        Ok(conn.execute("DELETE FROM activity_log", [])?)
    }

    // ---------------- Async wrappers (spawn_blocking) ----------------

    pub async fn record_async(&self, entry: ActivityEntry) -> AuditOutcome {
        let s = self.clone();
        match tokio::task::spawn_blocking(move || s.record(&entry)).await {
            Ok(outcome) => outcome,
            Err(err) => AuditOutcome::Dropped {
                reason: format!("join error: {err}"),
            },
        }
    }

    pub async fn recent_async(&self, limit: i64) -> StoreResult<Vec<ActivityRecord>> {
        let s = self.clone();
        tokio::task::spawn_blocking(move || s.recent(limit)).await?
    }

    pub async fn clear_async(&self) -> StoreResult<usize> {
        let s = self.clone();
        tokio::task::spawn_blocking(move || s.clear()).await?
    }
}
