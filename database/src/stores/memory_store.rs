use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use types::{
    CardCategory, CardId, ChronologyGame, DeckId, EventCard, LobbyId, PlayerId, Roster,
    RosterPlayer, UserId,
};

use super::traits::{page_offset, GameStore};
use crate::{
    default_deck::{default_deck_id, DEFAULT_DECK_CARDS, DEFAULT_DECK_NAME},
    DatabaseError, DeckRecord, LobbyRecord, LobbySummary,
};

#[derive(Default)]
struct MemoryState {
    lobbies: Vec<LobbyRecord>,
    players: HashMap<LobbyId, Vec<RosterPlayer>>,
    users: HashMap<UserId, String>,
    decks: Vec<DeckRecord>,
    cards: Vec<EventCard>,
    games: HashMap<LobbyId, ChronologyGame>,
}

impl MemoryState {
    fn roster(&self, lobby_id: LobbyId) -> Roster {
        Roster::new(self.players.get(&lobby_id).cloned().unwrap_or_default())
    }

    fn matching_lobbies<'a>(
        &'a self,
        name: Option<&str>,
    ) -> impl Iterator<Item = &'a LobbyRecord> + 'a {
        let needle = name.unwrap_or_default().to_lowercase();
        self.lobbies
            .iter()
            .rev()
            .filter(move |lobby| lobby.name.to_lowercase().contains(&needle))
    }
}

/// A store that keeps everything in process memory. Used by simulations and tests.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let deck_id = default_deck_id();
        let cards = DEFAULT_DECK_CARDS
            .iter()
            .map(|text| EventCard {
                id: CardId::new(),
                deck_id,
                category: CardCategory::Prompt,
                text: text.to_string(),
            })
            .collect::<Vec<_>>();
        let state = MemoryState {
            decks: vec![DeckRecord {
                id: deck_id,
                name: DEFAULT_DECK_NAME.to_string(),
                card_count: cards.len() as u32,
            }],
            cards,
            ..MemoryState::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn create_lobby(
        &self,
        lobby: &LobbyRecord,
        game: Option<&ChronologyGame>,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        if state.lobbies.iter().any(|existing| existing.id == lobby.id) {
            return Err(DatabaseError::Query(format!("lobby {} already exists", lobby.id)));
        }
        state.lobbies.push(lobby.clone());
        if let Some(game) = game {
            state.games.insert(lobby.id, game.clone());
        }
        Ok(())
    }

    async fn get_lobby(&self, lobby_id: LobbyId) -> Result<Option<LobbyRecord>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.lobbies.iter().find(|lobby| lobby.id == lobby_id).cloned())
    }

    async fn search_lobbies(
        &self,
        name: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<LobbySummary>, DatabaseError> {
        let state = self.state.read().await;
        let summaries = state
            .matching_lobbies(name)
            .skip(page_offset(page, page_size) as usize)
            .take(page_size as usize)
            .map(|lobby| LobbySummary {
                id: lobby.id,
                name: lobby.name.clone(),
                created_at: lobby.created_at,
                active_players: state.roster(lobby.id).active_count() as u32,
                status: state
                    .games
                    .get(&lobby.id)
                    .map(|game| game.status())
                    .unwrap_or_default(),
                has_password: lobby.has_password(),
            })
            .collect();
        Ok(summaries)
    }

    async fn count_lobbies(&self, name: Option<&str>) -> Result<u64, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.matching_lobbies(name).count() as u64)
    }

    async fn join_lobby(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
        name: &str,
    ) -> Result<RosterPlayer, DatabaseError> {
        let mut state = self.state.write().await;
        if !state.lobbies.iter().any(|lobby| lobby.id == lobby_id) {
            return Err(DatabaseError::LobbyNotFound(lobby_id));
        }
        state.users.insert(user_id, name.to_string());

        let players = state.players.entry(lobby_id).or_default();
        if let Some(player) = players.iter_mut().find(|player| player.user_id == user_id) {
            player.is_active = true;
            player.name = name.to_string();
            return Ok(player.clone());
        }
        let join_order = players.iter().map(|player| player.join_order).max().unwrap_or(0) + 1;
        let player = RosterPlayer {
            id: PlayerId::new(),
            user_id,
            name: name.to_string(),
            join_order,
            is_active: true,
        };
        players.push(player.clone());
        tracing::debug!(%lobby_id, player_id = %player.id, join_order, "Player joined lobby");
        Ok(player)
    }

    async fn find_player(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
    ) -> Result<Option<RosterPlayer>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .players
            .get(&lobby_id)
            .and_then(|players| players.iter().find(|player| player.user_id == user_id))
            .cloned())
    }

    async fn roster(&self, lobby_id: LobbyId) -> Result<Roster, DatabaseError> {
        Ok(self.state.read().await.roster(lobby_id))
    }

    async fn create_deck(&self, name: &str) -> Result<DeckRecord, DatabaseError> {
        let mut state = self.state.write().await;
        if state.decks.iter().any(|deck| deck.name == name) {
            return Err(DatabaseError::Query(format!("deck {name:?} already exists")));
        }
        let deck = DeckRecord {
            id: DeckId::new(),
            name: name.to_string(),
            card_count: 0,
        };
        state.decks.push(deck.clone());
        Ok(deck)
    }

    async fn add_cards(
        &self,
        deck_id: DeckId,
        cards: &[(CardCategory, String)],
    ) -> Result<Vec<EventCard>, DatabaseError> {
        let mut state = self.state.write().await;
        let Some(deck) = state.decks.iter_mut().find(|deck| deck.id == deck_id) else {
            return Err(DatabaseError::Query(format!("deck {deck_id} does not exist")));
        };
        deck.card_count += cards.len() as u32;
        let inserted: Vec<_> = cards
            .iter()
            .map(|(category, text)| EventCard {
                id: CardId::new(),
                deck_id,
                category: *category,
                text: text.clone(),
            })
            .collect();
        state.cards.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn cards_in_decks(&self, deck_ids: &[DeckId]) -> Result<Vec<EventCard>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .cards
            .iter()
            .filter(|card| deck_ids.contains(&card.deck_id))
            .cloned()
            .collect())
    }

    async fn load_game(&self, lobby_id: LobbyId) -> Result<Option<ChronologyGame>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.games.get(&lobby_id).map(|game| {
            let mut game = game.clone();
            game.roster = state.roster(lobby_id);
            game
        }))
    }

    async fn save_game(&self, game: &ChronologyGame) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let lobby_id = game.game.lobby_id;
        if !state.lobbies.iter().any(|lobby| lobby.id == lobby_id) {
            return Err(DatabaseError::LobbyNotFound(lobby_id));
        }
        if let Some(players) = state.players.get_mut(&lobby_id) {
            for player in players.iter_mut() {
                if let Some(saved) = game.roster.get(player.id) {
                    player.is_active = saved.is_active;
                }
            }
        }
        state.games.insert(lobby_id, game.clone());
        Ok(())
    }
}
