pub mod card;
pub mod draw_pile;
pub mod error;
pub mod event;
pub mod game_state;
pub mod ids;
pub mod roster;
pub mod strategy;
pub mod timeline;

pub use card::{parse_year, CardCategory, DatedCard, EventCard, MAX_YEAR, MIN_YEAR};
pub use draw_pile::{DrawPile, DrawPileEntry};
pub use error::{DrawPileExhausted, ErrorKind, GameError};
pub use event::{FinishReason, GameEvent};
pub use game_state::{
    ChronologyGame, Game, GameStatus, Placement, StartReport, TurnEnd, TurnReport,
    DEFAULT_CARDS_TO_WIN,
};
pub use ids::{CardId, DeckId, GameId, LobbyId, PlayerId, TimelineEntryId, UserId};
pub use roster::{Roster, RosterPlayer};
pub use strategy::{PlacementStrategy, TurnView};
pub use timeline::{placement_is_correct, Timeline, TimelineEntry};
