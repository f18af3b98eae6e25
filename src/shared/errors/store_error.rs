use thiserror::Error;

use crate::shared::utils::retry::Transient;

/// 저장소(Store) 계층 에러
/// Storage-layer errors shared by the Postgres repositories and the in-memory stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// 직렬화 실패 / 데드락 (재시도하면 성공할 수 있음)
    /// Serialization failure or deadlock
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// 커넥션 풀 고갈 등 일시적 장애
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::Unavailable(_))
    }
}

/// PostgreSQL SQLSTATE
/// 40001: serialization_failure, 40P01: deadlock_detected
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned());
                match code.as_deref() {
                    Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                        StoreError::Conflict(db_err.message().to_string())
                    }
                    _ => StoreError::Database(db_err.message().to_string()),
                }
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Io(io) => StoreError::Unavailable(io.to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}
