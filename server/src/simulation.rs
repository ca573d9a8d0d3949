use std::time::Duration;

use types::{GameError, LobbyId, PlacementStrategy, UserId};

use crate::engine::{ChronologyEngine, EngineError, EngineResult};

/// A bot player: a user identity plus the strategy that places its cards.
#[derive(Debug)]
pub struct Seat {
    pub user_id: UserId,
    pub name: String,
    pub strategy: Box<dyn PlacementStrategy>,
}

impl Seat {
    pub fn new(name: impl Into<String>, strategy: Box<dyn PlacementStrategy>) -> Self {
        Self {
            user_id: UserId::new(),
            name: name.into(),
            strategy,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub lobby_id: LobbyId,
    pub winner: Option<String>,
    pub turns: usize,
    pub correct: usize,
}

/// Creates a lobby on the default deck and seats everyone in order.
pub async fn setup_lobby(
    engine: &ChronologyEngine,
    name: &str,
    cards_to_win: u32,
    seats: &[Seat],
) -> EngineResult<LobbyId> {
    let deck_ids = [engine.settings().default_deck_id];
    let lobby = engine
        .create_lobby_game(name, Some(cards_to_win), &deck_ids, None)
        .await?;
    for seat in seats {
        engine.join_lobby(lobby.id, seat.user_id, &seat.name, None).await?;
    }
    Ok(lobby.id)
}

/// Starts the lobby's game and lets each seat's strategy play until it finishes.
pub async fn run_game(
    engine: &ChronologyEngine,
    lobby_id: LobbyId,
    seats: &mut [Seat],
    delay_ms: Option<u64>,
) -> EngineResult<SimulationOutcome> {
    let starter = seats.first().ok_or(GameError::NoActivePlayers)?;
    engine.start_game(lobby_id, starter.user_id).await?;

    let mut turns = 0;
    let mut correct = 0;
    loop {
        let game = engine.ensure_game(lobby_id).await?;
        let Some(view) = game.turn_view() else {
            break;
        };
        if let Some(ms) = delay_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        let user_id = game
            .roster
            .get(view.player_id)
            .map(|player| player.user_id)
            .ok_or(EngineError::PlayerNotInLobby)?;
        let seat = seats
            .iter_mut()
            .find(|seat| seat.user_id == user_id)
            .ok_or(EngineError::PlayerNotInLobby)?;

        let position = seat.strategy.select_position(&view);
        let report = engine.place_card(lobby_id, user_id, position).await?;
        log::debug!(
            "{} placed {} at {position}: {}",
            seat.name,
            report.placement.card,
            if report.placement.correct { "correct" } else { "wrong" }
        );
        turns += 1;
        if report.placement.correct {
            correct += 1;
        }
    }

    let game = engine.ensure_game(lobby_id).await?;
    let winner = game
        .game
        .winner_id
        .and_then(|winner| game.roster.get(winner))
        .map(|player| player.name.clone());
    log::info!(
        "Game {} finished after {turns} turns, winner: {}",
        game.id(),
        winner.as_deref().unwrap_or("nobody")
    );
    Ok(SimulationOutcome {
        lobby_id,
        winner,
        turns,
        correct,
    })
}
