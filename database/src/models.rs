use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use types::{DeckId, GameStatus, LobbyId};

pub const CHRONOLOGY_GAME_TYPE: &str = "chronology";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyRecord {
    pub id: LobbyId,
    pub name: String,
    pub game_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
}

impl LobbyRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LobbyId::new(),
            name: name.into(),
            game_type: CHRONOLOGY_GAME_TYPE.to_string(),
            created_at: Utc::now(),
            password_hash: None,
        }
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// One row of a lobby search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub id: LobbyId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub active_players: u32,
    pub status: GameStatus,
    pub has_password: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckRecord {
    pub id: DeckId,
    pub name: String,
    pub card_count: u32,
}
