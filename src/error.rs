use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("record directory error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
