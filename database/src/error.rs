use thiserror::Error;
use types::LobbyId;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Lobby not found: {0}")]
    LobbyNotFound(LobbyId),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("UUID parsing error: {0}")]
    UuidParsing(#[from] uuid::Error),
}

impl DatabaseError {
    pub(crate) fn query(e: sqlx::Error) -> Self {
        DatabaseError::Query(e.to_string())
    }

    pub(crate) fn transaction(e: sqlx::Error) -> Self {
        DatabaseError::Transaction(e.to_string())
    }
}
