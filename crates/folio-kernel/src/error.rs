use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("invalid setting key {0:?}")]
    InvalidKey(String),
    #[error("table {0} does not exist")]
    MissingTable(String),
    #[error("{name} already exists as a {kind}, not a table")]
    NotATable { name: String, kind: String },
    #[error("join error: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Join(err.to_string())
    }
}

/// Primary SQLite message. Parse-time failures such as `CREATE TABLE` on an
/// existing name arrive as `SqlInputError`, runtime ones as `SqliteFailure`.
fn sqlite_message(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => Some(msg),
        rusqlite::Error::SqlInputError { msg, .. } => Some(msg),
        _ => None,
    }
}

pub(crate) fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    sqlite_message(err).is_some_and(|msg| msg.starts_with("duplicate column name"))
}

/// Only a *table* of that name counts; "view x already exists" does not.
pub(crate) fn is_table_exists(err: &rusqlite::Error) -> bool {
    sqlite_message(err).is_some_and(|msg| msg.starts_with("table ") && msg.ends_with("already exists"))
}
