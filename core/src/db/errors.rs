use anyhow::Error as AnyError;
use sqlx::{Error as SqlxError, error::DatabaseError};
use std::error::Error as StdError;

const SQLITE_UNIQUE_VIOLATION: &str = "2067";
const SQLITE_PRIMARY_KEY_VIOLATION: &str = "1555";

/// Returns `true` if any cause in the chain is a SQLite uniqueness or
/// primary-key violation.
pub fn is_unique_violation(err: &AnyError) -> bool {
    err.chain().any(is_unique_violation_cause)
}

fn is_unique_violation_cause(cause: &(dyn StdError + 'static)) -> bool {
    if let Some(SqlxError::Database(db_err)) = cause.downcast_ref::<SqlxError>() {
        if database_code_is_unique(db_err.as_ref()) {
            return true;
        }
    }

    cause
        .to_string()
        .to_ascii_lowercase()
        .contains("unique constraint failed")
}

fn database_code_is_unique(err: &(dyn DatabaseError + 'static)) -> bool {
    err.code()
        .map(|code| {
            matches!(
                code.as_ref(),
                SQLITE_UNIQUE_VIOLATION | SQLITE_PRIMARY_KEY_VIOLATION
            )
        })
        .unwrap_or(false)
}
