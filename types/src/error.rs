use thiserror::Error;

use crate::ids::PlayerId;

/// Broad classes of failure, used by callers to pick a response without
/// matching on every variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Conflict,
    Exhaustion,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("no decks provided")]
    NoDecksProvided,

    #[error("invalid position {position} for a timeline of {len} cards")]
    InvalidPosition { position: usize, len: usize },

    #[error("invalid win threshold: {0}")]
    InvalidThreshold(u32),

    #[error("no current card to place")]
    NoCardToPlace,

    #[error("it is not {0}'s turn")]
    NotYourTurn(PlayerId),

    #[error("player {0} is not in this game")]
    PlayerNotInGame(PlayerId),

    #[error("game already started")]
    AlreadyStarted,

    #[error("game is not finished")]
    NotFinished,

    #[error("not enough cards to deal: need {needed}, have {available}")]
    InsufficientCards { needed: usize, available: usize },

    #[error("no active players")]
    NoActivePlayers,

    #[error(transparent)]
    DrawPileExhausted(#[from] DrawPileExhausted),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::NoDecksProvided
            | GameError::InvalidPosition { .. }
            | GameError::InvalidThreshold(_) => ErrorKind::Validation,
            GameError::NotYourTurn(_) | GameError::PlayerNotInGame(_) => ErrorKind::Authorization,
            GameError::NoCardToPlace | GameError::AlreadyStarted | GameError::NotFinished => {
                ErrorKind::Conflict
            }
            GameError::InsufficientCards { .. }
            | GameError::NoActivePlayers
            | GameError::DrawPileExhausted(_) => ErrorKind::Exhaustion,
        }
    }
}

/// Returned when a draw is attempted on a pile with nothing left undrawn.
/// An expected end condition, not a fault.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("draw pile exhausted")]
pub struct DrawPileExhausted;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(GameError::NoDecksProvided.kind(), ErrorKind::Validation);
        assert_eq!(
            GameError::NotYourTurn(PlayerId::new()).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(GameError::AlreadyStarted.kind(), ErrorKind::Conflict);
        assert_eq!(
            GameError::from(DrawPileExhausted).kind(),
            ErrorKind::Exhaustion
        );
    }
}
