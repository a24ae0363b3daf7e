//! Additive schema management.
//!
//! The live schema is the only version marker: a table or column is either
//! present or it is not. Steps only ever add; nothing here drops, renames or
//! retypes a column.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use tracing::info;

use crate::error::{is_duplicate_column, is_table_exists, StoreError, StoreResult};
use crate::Kernel;

/// A table in its current full shape. `columns` is the body of the
/// `CREATE TABLE` statement and is trusted SQL from the catalog.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static str,
}

/// One additive step: bring `table` up to date by adding `column` with
/// `definition` (type plus constant default) when it is missing.
#[derive(Debug, Clone, Copy)]
pub struct ColumnStep {
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
}

/// Declared target schema. Column steps are append-only and applied in order.
#[derive(Debug, Clone, Copy)]
pub struct SchemaCatalog {
    pub tables: &'static [TableSpec],
    pub columns: &'static [ColumnStep],
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct SchemaReport {
    pub tables_created: Vec<String>,
    /// `table.column` for every column added by this run.
    pub columns_added: Vec<String>,
}

impl SchemaReport {
    pub fn is_noop(&self) -> bool {
        self.tables_created.is_empty() && self.columns_added.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct SchemaManager {
    kernel: Kernel,
}

impl SchemaManager {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    /// Create `name` when absent. Returns `true` if this call created it.
    pub fn ensure_table(&self, name: &str, column_defs: &str) -> StoreResult<bool> {
        let conn = self.kernel.conn()?;
        ensure_table_on(&conn, name, column_defs)
    }

    /// Add `column` to `table` when absent. Returns `true` if this call added it.
    pub fn ensure_column(&self, table: &str, column: &str, definition: &str) -> StoreResult<bool> {
        let conn = self.kernel.conn()?;
        ensure_column_on(&conn, table, column, definition)
    }

    pub fn table_exists(&self, name: &str) -> StoreResult<bool> {
        let conn = self.kernel.conn()?;
        table_exists_on(&conn, name)
    }

    /// Live column names in declaration order. Empty when the table is missing.
    pub fn columns(&self, table: &str) -> StoreResult<Vec<String>> {
        let conn = self.kernel.conn()?;
        table_columns(&conn, table)
    }

    /// Bring storage in line with `catalog`: every table first, then every
    /// column step in declaration order.
    ///
    /// Runs inside a single `BEGIN IMMEDIATE` transaction. SQLite hands the
    /// write lock to one connection at a time, so two processes starting
    /// against the same file serialize here instead of racing on
    /// `PRAGMA table_info`. Any error rolls the whole run back and is fatal to
    /// the caller.
    pub fn apply(&self, catalog: &SchemaCatalog) -> StoreResult<SchemaReport> {
        let mut conn = self.kernel.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut report = SchemaReport::default();
        for table in catalog.tables {
            if ensure_table_on(&tx, table.name, table.columns)? {
                report.tables_created.push(table.name.to_string());
            }
        }
        for step in catalog.columns {
            if ensure_column_on(&tx, step.table, step.column, step.definition)? {
                report
                    .columns_added
                    .push(format!("{}.{}", step.table, step.column));
            }
        }
        tx.commit()?;
        info!(
            target: "folio::schema",
            tables_created = report.tables_created.len(),
            columns_added = report.columns_added.len(),
            "schema verified"
        );
        Ok(report)
    }

    pub async fn apply_async(&self, catalog: SchemaCatalog) -> StoreResult<SchemaReport> {
        let s = self.clone();
        tokio::task::spawn_blocking(move || s.apply(&catalog)).await?
    }
}

pub(crate) fn validate_ident(raw: &str) -> StoreResult<&str> {
    let mut chars = raw.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_head && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && raw.len() <= 64 {
        Ok(raw)
    } else {
        Err(StoreError::InvalidIdentifier(raw.to_string()))
    }
}

fn table_exists_on(conn: &Connection, name: &str) -> StoreResult<bool> {
    let name = validate_ident(name)?;
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type='table' AND name=?1 COLLATE NOCASE",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Kind of whatever object already owns `name` (`table`, `view`, `index`, `trigger`).
fn object_kind_on(conn: &Connection, name: &str) -> StoreResult<Option<String>> {
    let kind = conn
        .query_row(
            "SELECT type FROM sqlite_master WHERE name=?1 COLLATE NOCASE",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(kind)
}

pub(crate) fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let table = validate_ident(table)?;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn ensure_table_on(conn: &Connection, name: &str, column_defs: &str) -> StoreResult<bool> {
    let name = validate_ident(name)?;
    match object_kind_on(conn, name)?.as_deref() {
        Some("table") => return Ok(false),
        Some(kind) => {
            return Err(StoreError::NotATable {
                name: name.to_string(),
                kind: kind.to_string(),
            })
        }
        None => {}
    }
    match conn.execute_batch(&format!("CREATE TABLE {name} ({column_defs})")) {
        Ok(()) => {
            info!(target: "folio::schema", table = name, "created table");
            Ok(true)
        }
        Err(err) if is_table_exists(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn ensure_column_on(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> StoreResult<bool> {
    let table = validate_ident(table)?;
    let column = validate_ident(column)?;
    let existing = table_columns(conn, table)?;
    if existing.is_empty() {
        return Err(StoreError::MissingTable(table.to_string()));
    }
    // SQLite identifiers are case-insensitive
    if existing.iter().any(|c| c.eq_ignore_ascii_case(column)) {
        return Ok(false);
    }
    // A single ALTER is atomic: the column either lands with its default or not at all.
    match conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}")) {
        Ok(()) => {
            info!(target: "folio::schema", table, column, "added column");
            Ok(true)
        }
        Err(err) if is_duplicate_column(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}
