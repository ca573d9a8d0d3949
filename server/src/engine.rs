use std::sync::Arc;

use dashmap::DashMap;
use database::{DatabaseError, DeckRecord, GameStore, LobbyRecord, LobbySummary};
use rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use types::{
    parse_year, CardCategory, ChronologyGame, DeckId, DrawPile, ErrorKind, Game, GameError,
    GameEvent, LobbyId, Roster, RosterPlayer, StartReport, TurnReport, UserId,
};

use crate::{
    notifier::Notifier,
    password::{self, PasswordError},
};

pub const MAX_LOBBY_NAME_LEN: usize = 100;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("storage failure: {0}")]
    Database(DatabaseError),

    #[error("lobby {0} not found")]
    LobbyNotFound(LobbyId),

    #[error("not a player in this lobby")]
    PlayerNotInLobby,

    #[error("invalid lobby name: {0}")]
    InvalidLobbyName(String),

    #[error("incorrect lobby password")]
    IncorrectPassword,

    #[error("password check failed: {0}")]
    Password(#[from] PasswordError),
}

impl From<DatabaseError> for EngineError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::LobbyNotFound(lobby_id) => EngineError::LobbyNotFound(lobby_id),
            other => EngineError::Database(other),
        }
    }
}

impl EngineError {
    /// `None` means an internal failure the caller cannot fix.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            EngineError::Game(e) => Some(e.kind()),
            EngineError::Database(_) => None,
            EngineError::LobbyNotFound(_) => Some(ErrorKind::NotFound),
            EngineError::PlayerNotInLobby => Some(ErrorKind::Authorization),
            EngineError::InvalidLobbyName(_) => Some(ErrorKind::Validation),
            EngineError::IncorrectPassword => Some(ErrorKind::Authorization),
            EngineError::Password(_) => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub default_cards_to_win: u32,
    pub default_deck_id: DeckId,
    pub rng_seed: Option<u64>,
    /// bcrypt cost for lobby passwords.
    pub password_cost: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_cards_to_win: types::DEFAULT_CARDS_TO_WIN,
            default_deck_id: database::default_deck_id(),
            rng_seed: None,
            password_cost: password::DEFAULT_COST,
        }
    }
}

/// The outcome of importing a text deck.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportSummary {
    pub deck: DeckRecord,
    pub cards: usize,
    pub dated: usize,
}

/// Runs every lobby command against the store.
///
/// Mutations on one lobby are serialized by a per-lobby lock held from load
/// to commit; each one loads the aggregate, applies a pure transition, saves
/// it in one store call and then publishes the resulting events. Reads go
/// straight to the store.
pub struct ChronologyEngine {
    store: Arc<dyn GameStore>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
    locks: DashMap<LobbyId, Arc<Mutex<()>>>,
    rng: Mutex<StdRng>,
}

impl ChronologyEngine {
    pub fn new(
        store: Arc<dyn GameStore>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            notifier,
            settings,
            locks: DashMap::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Locks an existing lobby. The lock entry is dropped again once nobody
    /// holds or waits for it.
    async fn lock_lobby(&self, lobby_id: LobbyId) -> EngineResult<LobbyGuard<'_>> {
        let lobby = self
            .store
            .get_lobby(lobby_id)
            .await?
            .ok_or(EngineError::LobbyNotFound(lobby_id))?;
        let lock = self.locks.entry(lobby_id).or_default().clone();
        let guard = lock.lock_owned().await;
        Ok(LobbyGuard {
            locks: &self.locks,
            lobby,
            guard: Some(guard),
        })
    }

    fn publish(&self, lobby_id: LobbyId, events: &[GameEvent]) {
        if !events.is_empty() {
            self.notifier.publish(lobby_id, events);
        }
    }

    /// Creates a lobby and its game, seeding the draw pile from `deck_ids`.
    /// A non-empty `password` is stored hashed and checked on first join.
    pub async fn create_lobby_game(
        &self,
        name: &str,
        cards_to_win: Option<u32>,
        deck_ids: &[DeckId],
        password: Option<&str>,
    ) -> EngineResult<LobbyRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidLobbyName("name is required".to_string()));
        }
        if name.chars().count() > MAX_LOBBY_NAME_LEN {
            return Err(EngineError::InvalidLobbyName(format!(
                "name must be at most {MAX_LOBBY_NAME_LEN} characters"
            )));
        }

        let mut lobby = LobbyRecord::new(name);
        let game = Game::new(
            lobby.id,
            cards_to_win.unwrap_or(self.settings.default_cards_to_win),
        )?;
        let cards = self.store.cards_in_decks(deck_ids).await?;
        let mut pile = DrawPile::initialize(deck_ids, &cards)?;
        let dropped = pile.resolve_years();
        if let Some(password) = password::normalize(password) {
            lobby.password_hash =
                Some(password::hash_password(password, self.settings.password_cost).await?);
        }
        self.store
            .create_lobby(&lobby, Some(&ChronologyGame::new(game, pile.clone(), Roster::default())))
            .await?;

        tracing::info!(
            lobby_id = %lobby.id,
            decks = deck_ids.len(),
            cards = pile.len(),
            dropped,
            has_password = lobby.has_password(),
            "Created chronology lobby"
        );
        Ok(lobby)
    }

    /// Loads the lobby's game, creating one with the default deck if the
    /// lobby has none yet.
    pub async fn ensure_game(&self, lobby_id: LobbyId) -> EngineResult<ChronologyGame> {
        if let Some(game) = self.store.load_game(lobby_id).await? {
            return Ok(game);
        }
        let _guard = self.lock_lobby(lobby_id).await?;
        self.load_or_create(lobby_id).await
    }

    /// Caller must hold the lobby lock.
    async fn load_or_create(&self, lobby_id: LobbyId) -> EngineResult<ChronologyGame> {
        if let Some(game) = self.store.load_game(lobby_id).await? {
            return Ok(game);
        }

        let game = Game::new(lobby_id, self.settings.default_cards_to_win)?;
        let deck_ids = [self.settings.default_deck_id];
        let pile = match self.store.cards_in_decks(&deck_ids).await {
            Ok(cards) => match DrawPile::initialize(&deck_ids, &cards) {
                Ok(mut pile) => {
                    pile.resolve_years();
                    pile
                }
                Err(e) => {
                    tracing::warn!(%lobby_id, error = %e, "Failed to seed default deck");
                    DrawPile::default()
                }
            },
            Err(e) => {
                tracing::warn!(%lobby_id, error = %e, "Failed to load default deck");
                DrawPile::default()
            }
        };
        let roster = self.store.roster(lobby_id).await?;
        let game = ChronologyGame::new(game, pile, roster);
        self.store.save_game(&game).await?;
        tracing::info!(%lobby_id, game_id = %game.id(), "Created missing game for lobby");
        Ok(game)
    }

    /// Joins the lobby or reactivates the user's existing seat.
    ///
    /// A password protected lobby asks for its password only from users who
    /// have never joined it.
    pub async fn join_lobby(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
        name: &str,
        password: Option<&str>,
    ) -> EngineResult<RosterPlayer> {
        let guard = self.lock_lobby(lobby_id).await?;
        if let Some(hash) = guard.lobby.password_hash.as_deref() {
            let returning = self.store.find_player(lobby_id, user_id).await?.is_some();
            if !returning && !password::verify_password(password.unwrap_or_default(), hash).await? {
                tracing::info!(%lobby_id, %user_id, "Rejected join with incorrect password");
                return Err(EngineError::IncorrectPassword);
            }
        }
        let player = self.store.join_lobby(lobby_id, user_id, name).await?;
        self.publish(lobby_id, &[GameEvent::RosterChanged]);
        Ok(player)
    }

    pub async fn leave_lobby(&self, lobby_id: LobbyId, user_id: UserId) -> EngineResult<()> {
        let _guard = self.lock_lobby(lobby_id).await?;
        let player = self.active_player(lobby_id, user_id).await?;
        let mut game = self.load_or_create(lobby_id).await?;
        let events = game.player_left(player.id)?;
        self.store.save_game(&game).await?;
        tracing::info!(%lobby_id, player_id = %player.id, "Player left lobby");
        self.publish(lobby_id, &events);
        Ok(())
    }

    pub async fn start_game(&self, lobby_id: LobbyId, user_id: UserId) -> EngineResult<StartReport> {
        let _guard = self.lock_lobby(lobby_id).await?;
        self.active_player(lobby_id, user_id).await?;
        let mut game = self.load_or_create(lobby_id).await?;
        let report = {
            let mut rng = self.rng.lock().await;
            game.start(&mut *rng)?
        };
        self.store.save_game(&game).await?;
        self.publish(lobby_id, &report.events);
        Ok(report)
    }

    /// Runs one full turn for the acting user: place, win check, advance, redraw.
    pub async fn place_card(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
        position: usize,
    ) -> EngineResult<TurnReport> {
        let _guard = self.lock_lobby(lobby_id).await?;
        let player = self.active_player(lobby_id, user_id).await?;
        let mut game = self.load_or_create(lobby_id).await?;
        let report = {
            let mut rng = self.rng.lock().await;
            game.play_turn(player.id, position, &mut *rng)?
        };
        self.store.save_game(&game).await?;
        tracing::debug!(
            %lobby_id,
            player_id = %player.id,
            position,
            correct = report.placement.correct,
            "Card placed"
        );
        self.publish(lobby_id, &report.events);
        Ok(report)
    }

    pub async fn reset_game(&self, lobby_id: LobbyId, user_id: UserId) -> EngineResult<()> {
        let _guard = self.lock_lobby(lobby_id).await?;
        self.active_player(lobby_id, user_id).await?;
        let mut game = self.load_or_create(lobby_id).await?;
        let events = game.reset()?;
        self.store.save_game(&game).await?;
        self.publish(lobby_id, &events);
        Ok(())
    }

    /// The game as seen by one of the lobby's players.
    pub async fn game_for_viewer(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
    ) -> EngineResult<(ChronologyGame, RosterPlayer)> {
        let game = self.ensure_game(lobby_id).await?;
        let viewer = self
            .store
            .find_player(lobby_id, user_id)
            .await?
            .ok_or(EngineError::PlayerNotInLobby)?;
        Ok((game, viewer))
    }

    pub async fn search_lobbies(
        &self,
        name: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> EngineResult<(Vec<LobbySummary>, u64)> {
        let name = name.map(str::trim).filter(|name| !name.is_empty());
        let lobbies = self.store.search_lobbies(name, page, page_size).await?;
        let total = self.store.count_lobbies(name).await?;
        Ok((lobbies, total))
    }

    /// Loads one prompt card per non-empty line into a new deck.
    pub async fn import_deck(&self, name: &str, text: &str) -> EngineResult<ImportSummary> {
        let lines: Vec<(CardCategory, String)> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| (CardCategory::Prompt, line.to_string()))
            .collect();
        let dated = lines
            .iter()
            .filter(|(_, line)| parse_year(line).is_some())
            .count();

        let mut deck = self.store.create_deck(name).await?;
        self.store.add_cards(deck.id, &lines).await?;
        deck.card_count = lines.len() as u32;
        tracing::info!(deck_id = %deck.id, cards = lines.len(), dated, "Imported deck");
        Ok(ImportSummary {
            deck,
            cards: lines.len(),
            dated,
        })
    }

    async fn active_player(&self, lobby_id: LobbyId, user_id: UserId) -> EngineResult<RosterPlayer> {
        match self.store.find_player(lobby_id, user_id).await? {
            Some(player) if player.is_active => Ok(player),
            _ => Err(EngineError::PlayerNotInLobby),
        }
    }
}

struct LobbyGuard<'a> {
    locks: &'a DashMap<LobbyId, Arc<Mutex<()>>>,
    lobby: LobbyRecord,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LobbyGuard<'_> {
    fn drop(&mut self) {
        // Release first so the map holds the only reference when idle.
        self.guard.take();
        self.locks
            .remove_if(&self.lobby.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
