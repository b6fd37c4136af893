use jiff::Timestamp;
use tally_core::code::SequenceCode;
use tally_core::error::{Result, StorageError};
use tally_core::repository::{IssuedCode, QaStatus};

pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            StorageError::Conflict(message)
        }
        _ => StorageError::Query(message),
    }
}

pub(crate) fn parse_created_at(seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{}': {e}", seconds))
    })
}

/// Builds a ledger row from its stored column values.
pub(crate) fn issued_code_from_columns(
    id: i64,
    created_by: String,
    code_number: &str,
    qa_status: &str,
    created_at: i64,
) -> Result<IssuedCode> {
    Ok(IssuedCode {
        id,
        created_by,
        code_number: SequenceCode::parse(code_number)?,
        qa_status: qa_status.parse::<QaStatus>()?,
        created_at: parse_created_at(created_at)?,
    })
}
