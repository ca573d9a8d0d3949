use async_trait::async_trait;
use types::{CardCategory, ChronologyGame, DeckId, EventCard, LobbyId, Roster, RosterPlayer, UserId};

use crate::{DatabaseError, DeckRecord, LobbyRecord, LobbySummary};

/// Persistent state for lobbies, players, decks and games.
///
/// Every method is one atomic unit: it either commits in full or leaves the
/// store unchanged. Callers serialize mutations per lobby themselves.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Inserts a lobby and, when given, its game in one transaction.
    async fn create_lobby(
        &self,
        lobby: &LobbyRecord,
        game: Option<&ChronologyGame>,
    ) -> Result<(), DatabaseError>;

    async fn get_lobby(&self, lobby_id: LobbyId) -> Result<Option<LobbyRecord>, DatabaseError>;

    /// Lobbies whose name contains `name`, newest first. `page` starts at 1.
    async fn search_lobbies(
        &self,
        name: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<LobbySummary>, DatabaseError>;

    async fn count_lobbies(&self, name: Option<&str>) -> Result<u64, DatabaseError>;

    /// Adds the user to the lobby, or reactivates their existing seat.
    /// The user's display name is updated either way.
    async fn join_lobby(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
        name: &str,
    ) -> Result<RosterPlayer, DatabaseError>;

    async fn find_player(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
    ) -> Result<Option<RosterPlayer>, DatabaseError>;

    async fn roster(&self, lobby_id: LobbyId) -> Result<Roster, DatabaseError>;

    async fn create_deck(&self, name: &str) -> Result<DeckRecord, DatabaseError>;

    async fn add_cards(
        &self,
        deck_id: DeckId,
        cards: &[(CardCategory, String)],
    ) -> Result<Vec<EventCard>, DatabaseError>;

    async fn cards_in_decks(&self, deck_ids: &[DeckId]) -> Result<Vec<EventCard>, DatabaseError>;

    /// Loads the lobby's game with a fresh roster.
    async fn load_game(&self, lobby_id: LobbyId) -> Result<Option<ChronologyGame>, DatabaseError>;

    /// Writes the whole aggregate: game row, current card, pile flags,
    /// timelines and player activity.
    async fn save_game(&self, game: &ChronologyGame) -> Result<(), DatabaseError>;
}

pub(crate) fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(page_size)
}
