use thiserror::Error;

/// Errors raised by the store.
///
/// Engine failures are passed through untouched so the SQLite message
/// stays visible to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("column `{column}` missing from row")]
    MissingColumn { column: String },

    #[error("column `{column}`: expected {expected}, found {found}")]
    UnexpectedType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A batch statement failed and the transaction was rolled back.
    #[error("batch aborted at statement {index} (`{statement}`): {source}")]
    BatchAborted {
        index: usize,
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("batch failed at statement {index}: {source}; rollback also failed: {rollback}")]
    RollbackFailed {
        index: usize,
        #[source]
        source: rusqlite::Error,
        rollback: rusqlite::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
