//! Auth service errors.

use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthServiceError {
    /// The presented token is malformed, revoked, or belongs to nobody.
    #[error("token not found")]
    NotFound,

    #[error("a user with this email already exists")]
    AlreadyExists,

    #[error("email address is invalid")]
    InvalidEmail,

    #[error("auth storage error")]
    Sql(#[source] sqlx::Error),
}

impl From<sqlx::Error> for AuthServiceError {
    fn from(error: sqlx::Error) -> Self {
        let unique_violation = error
            .as_database_error()
            .is_some_and(|db| matches!(db.kind(), ErrorKind::UniqueViolation));

        if unique_violation {
            Self::AlreadyExists
        } else {
            Self::Sql(error)
        }
    }
}
