use worktrack_shared::domain::TaskStatus;
use worktrack_shared::jwt::JwtError;

use crate::qr::QrError;
use crate::storage::StorageError;

/// Domain error shared by identity, QR, workflow and metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("email already registered")]
    DuplicateEmail,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("QR credential not found")]
    CredentialNotFound,

    #[error("cannot {action} a task that is {actual}")]
    InvalidStateTransition {
        action: &'static str,
        actual: TaskStatus,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("token error: {0}")]
    Token(#[from] JwtError),

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl CoreError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
}
