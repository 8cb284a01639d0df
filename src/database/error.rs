use crate::error::{AppError, AppErrorKind, InfrastructureError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DatabaseErrorKind {
    #[error("connection failed: {message}")]
    Connection { message: String },
    #[error("pool timed out waiting for a connection")]
    PoolTimeout,
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("migration failed: {message}")]
    Migration { message: String },
    #[error("{message}")]
    Unknown { message: String },
}

#[derive(Debug, Clone, Error)]
#[error("database error: {kind}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::PoolTimedOut => DatabaseErrorKind::PoolTimeout,
            sqlx::Error::Io(e) => DatabaseErrorKind::Connection {
                message: e.to_string(),
            },
            sqlx::Error::Tls(e) => DatabaseErrorKind::Connection {
                message: e.to_string(),
            },
            sqlx::Error::PoolClosed => DatabaseErrorKind::Connection {
                message: "pool closed".to_string(),
            },
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseErrorKind::UniqueViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                }
            }
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self::new(kind)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::Connection { .. } | DatabaseErrorKind::PoolTimeout
        )
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::new(DatabaseErrorKind::Migration {
            message: err.to_string(),
        })
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let is_retryable = err.is_retryable();
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.to_string(),
            is_retryable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());

        let app: AppError = err.into();
        assert_eq!(app.status_code(), 500);
        assert!(app.is_retryable());
    }

    #[test]
    fn row_not_found_is_not_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(!err.is_retryable());
        assert!(matches!(err.kind, DatabaseErrorKind::Unknown { .. }));
    }
}
