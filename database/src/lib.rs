pub mod config;
pub mod default_deck;
pub mod error;
pub mod models;
pub mod retry;
pub mod stores;

pub use config::DatabaseConfig;
pub use default_deck::{default_deck_id, DEFAULT_DECK_NAME};
pub use error::DatabaseError;
pub use models::{DeckRecord, LobbyRecord, LobbySummary, CHRONOLOGY_GAME_TYPE};
pub use retry::retry_with_backoff;
pub use stores::{GameStore, MemoryStore, SqliteStore};
