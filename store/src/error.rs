use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique field already holds this value in the collection.
    #[error("{field} already exists in {collection}")]
    Conflict {
        collection: &'static str,
        field: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("migration {name} failed: {reason}")]
    Migration { name: String, reason: String },

    #[error("invalid store configuration: {0}")]
    Config(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
