//! Mapping from driver errors to [`RepoError`].

use chaos_core::RepoError;

/// SQLSTATE for a serialization failure. Safe to retry the transaction.
const SERIALIZATION_FAILURE: &str = "40001";

/// True when `code` is a retryable serialization failure.
pub fn is_serialization_failure(code: Option<&str>) -> bool {
    code == Some(SERIALIZATION_FAILURE)
}

pub(crate) fn sqlstate(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

/// Convert a driver error into the datastore error taxonomy.
pub fn map_error(e: sqlx::Error) -> RepoError {
    match e {
        sqlx::Error::PoolTimedOut => RepoError::Pool("timed out acquiring a connection".into()),
        sqlx::Error::PoolClosed => RepoError::Pool("pool closed".into()),
        sqlx::Error::Io(e) => RepoError::Pool(format!("connection lost: {e}")),
        sqlx::Error::Tls(e) => RepoError::Pool(format!("tls: {e}")),
        sqlx::Error::ColumnDecode { index, source } => {
            RepoError::InvalidData(format!("column {index}: {source}"))
        }
        sqlx::Error::Decode(e) => RepoError::InvalidData(e.to_string()),
        other => RepoError::Database(other.to_string()),
    }
}
