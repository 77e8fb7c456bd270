use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Database(#[from] sqlx::Error),

    #[error("user already exists")]
    UserExists,

    #[error("user does not exist")]
    UserMissing,

    /// Record absent or owned by another user; callers cannot tell
    /// which.
    #[error("record not found")]
    NotFound,

    #[error("invalid record kind")]
    InvalidKind,
}
