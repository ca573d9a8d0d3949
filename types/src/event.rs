use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Winner,
    DrawPileExhausted,
    NoActivePlayers,
}

/// Something observers of a lobby should know about. Emitted by the game
/// after each successful transition, in the order things happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted {
        first_player: PlayerId,
    },
    CardPlaced {
        player_id: PlayerId,
        player_name: String,
        year: u16,
        correct: bool,
    },
    TurnAdvanced {
        player_id: PlayerId,
    },
    GameFinished {
        winner: Option<PlayerId>,
        winner_name: Option<String>,
        reason: FinishReason,
    },
    GameReset,
    RosterChanged,
}

impl GameEvent {
    /// Whether clients should rebuild their whole view rather than patch it.
    pub fn requires_reload(&self) -> bool {
        matches!(self, GameEvent::GameStarted { .. } | GameEvent::GameReset)
    }
}
