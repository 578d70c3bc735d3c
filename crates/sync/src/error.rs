use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::error::StorageError),

    #[error("Ranking error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("No local meet with code {0}")]
    UnknownMeet(String),

    #[error("Meet {0} is already in the archive (use --force to replace)")]
    AlreadySynced(String),
}
