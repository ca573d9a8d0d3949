use std::{collections::HashMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    card::DatedCard,
    draw_pile::DrawPile,
    error::{DrawPileExhausted, GameError},
    event::{FinishReason, GameEvent},
    ids::{GameId, LobbyId, PlayerId},
    roster::Roster,
    strategy::TurnView,
    timeline::Timeline,
};

pub const DEFAULT_CARDS_TO_WIN: u32 = 5;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Waiting,
    Active,
    Finished,
}

impl Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameStatus::Waiting => write!(f, "waiting"),
            GameStatus::Active => write!(f, "active"),
            GameStatus::Finished => write!(f, "finished"),
        }
    }
}

impl FromStr for GameStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(GameStatus::Waiting),
            "active" => Ok(GameStatus::Active),
            "finished" => Ok(GameStatus::Finished),
            other => Err(format!("unknown game status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub lobby_id: LobbyId,
    pub created_at: DateTime<Utc>,
    pub current_player_id: Option<PlayerId>,
    pub status: GameStatus,
    pub cards_to_win: u32,
    pub winner_id: Option<PlayerId>,
    pub current_card: Option<DatedCard>,
}

impl Game {
    pub fn new(lobby_id: LobbyId, cards_to_win: u32) -> Result<Self, GameError> {
        if cards_to_win == 0 {
            return Err(GameError::InvalidThreshold(cards_to_win));
        }
        Ok(Self {
            id: GameId::new(),
            lobby_id,
            created_at: Utc::now(),
            current_player_id: None,
            status: GameStatus::Waiting,
            cards_to_win,
            winner_id: None,
            current_card: None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartReport {
    pub first_player: PlayerId,
    /// `None` when the pile ran dry during the deal and the game finished at once.
    pub opening_card: Option<DatedCard>,
    pub events: Vec<GameEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub card: DatedCard,
    pub position: usize,
    pub correct: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnEnd {
    Won(PlayerId),
    Next { player: PlayerId, card: DatedCard },
    Exhausted,
    NoActivePlayers,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub placement: Placement,
    pub end: TurnEnd,
    pub events: Vec<GameEvent>,
}

/// A lobby's game together with everything its rules need: the pile, the
/// roster and each player's timeline. All transitions are synchronous and
/// either apply completely or return an error without changing anything.
#[derive(Clone, Debug)]
pub struct ChronologyGame {
    pub game: Game,
    pub draw_pile: DrawPile,
    pub roster: Roster,
    timelines: HashMap<PlayerId, Timeline>,
}

impl ChronologyGame {
    pub fn new(game: Game, draw_pile: DrawPile, roster: Roster) -> Self {
        Self::from_parts(game, draw_pile, roster, HashMap::new())
    }

    pub fn from_parts(
        game: Game,
        draw_pile: DrawPile,
        roster: Roster,
        timelines: HashMap<PlayerId, Timeline>,
    ) -> Self {
        Self {
            game,
            draw_pile,
            roster,
            timelines,
        }
    }

    pub fn id(&self) -> GameId {
        self.game.id
    }

    pub fn status(&self) -> GameStatus {
        self.game.status
    }

    pub fn timeline(&self, player_id: PlayerId) -> Option<&Timeline> {
        self.timelines.get(&player_id)
    }

    pub fn timelines(&self) -> impl Iterator<Item = (&PlayerId, &Timeline)> {
        self.timelines.iter()
    }

    pub fn timeline_size(&self, player_id: PlayerId) -> usize {
        self.timeline(player_id).map_or(0, Timeline::len)
    }

    pub fn current_card(&self) -> Option<&DatedCard> {
        self.game.current_card.as_ref()
    }

    pub fn clear_current_card(&mut self) {
        self.game.current_card = None;
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.game.current_player_id
    }

    pub fn set_current_player(&mut self, player_id: PlayerId) {
        self.game.current_player_id = Some(player_id);
    }

    /// The view handed to whoever must place the current card.
    pub fn turn_view(&self) -> Option<TurnView> {
        let player_id = self.game.current_player_id?;
        let card = self.game.current_card.clone()?;
        Some(TurnView {
            player_id,
            player_name: self.player_name(player_id),
            card,
            timeline: self.timeline(player_id).map(Timeline::years).unwrap_or_default(),
            cards_to_win: self.game.cards_to_win,
        })
    }

    /// Draws the next card and makes it the current card.
    pub fn draw_random<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<&DatedCard, DrawPileExhausted> {
        let card = self.draw_pile.draw_random(rng)?;
        Ok(self.game.current_card.insert(card))
    }

    /// Moves the turn to the next active player in join order.
    pub fn advance_turn(&mut self) -> Result<PlayerId, GameError> {
        let next = self.roster.advance_from(self.game.current_player_id)?;
        self.game.current_player_id = Some(next);
        Ok(next)
    }

    /// Returns the winner, finishing the game the first time one qualifies.
    /// Active players are checked in join order, so the earliest joiner wins ties.
    pub fn check_winner(&mut self) -> Option<PlayerId> {
        if self.game.status != GameStatus::Active {
            return self.game.winner_id;
        }
        let winner = self
            .roster
            .active_players()
            .find(|player| self.timeline_size(player.id) >= self.game.cards_to_win as usize)
            .map(|player| player.id)?;
        self.game.status = GameStatus::Finished;
        self.game.winner_id = Some(winner);
        self.game.current_player_id = None;
        self.game.current_card = None;
        Some(winner)
    }

    pub fn finish_without_winner(&mut self, reason: FinishReason) -> GameEvent {
        self.game.status = GameStatus::Finished;
        self.game.winner_id = None;
        self.game.current_player_id = None;
        self.game.current_card = None;
        log::info!("Game {} finished without a winner: {reason:?}", self.game.id);
        GameEvent::GameFinished {
            winner: None,
            winner_name: None,
            reason,
        }
    }

    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<StartReport, GameError> {
        if self.game.status != GameStatus::Waiting {
            return Err(GameError::AlreadyStarted);
        }
        let active: Vec<PlayerId> = self.roster.active_players().map(|p| p.id).collect();
        let Some(&first_player) = active.first() else {
            return Err(GameError::NoActivePlayers);
        };
        let available = self.draw_pile.undrawn_count();
        if available < active.len() {
            return Err(GameError::InsufficientCards {
                needed: active.len(),
                available,
            });
        }

        for player_id in &active {
            let card = self.draw_pile.draw_random(rng)?;
            self.timelines.entry(*player_id).or_default().insert(card, 0)?;
        }
        self.game.status = GameStatus::Active;
        self.game.winner_id = None;
        self.set_current_player(first_player);
        log::info!(
            "Game {} started with {} players, {first_player} goes first",
            self.game.id,
            active.len()
        );

        let mut events = vec![GameEvent::GameStarted { first_player }];
        let opening_card = match self.draw_random(rng) {
            Ok(card) => Some(card.clone()),
            Err(DrawPileExhausted) => {
                events.push(self.finish_without_winner(FinishReason::DrawPileExhausted));
                None
            }
        };
        Ok(StartReport {
            first_player,
            opening_card,
            events,
        })
    }

    /// Judges and applies one placement of the current card. The card is
    /// consumed whether or not the placement was correct.
    pub fn place_card(&mut self, player_id: PlayerId, position: usize) -> Result<Placement, GameError> {
        let Some(card) = self.game.current_card.clone() else {
            return Err(GameError::NoCardToPlace);
        };
        if self.game.current_player_id != Some(player_id) {
            return Err(GameError::NotYourTurn(player_id));
        }
        let len = self.timeline_size(player_id);
        if position > len {
            return Err(GameError::InvalidPosition { position, len });
        }

        let timeline = self.timelines.entry(player_id).or_default();
        let correct = timeline.is_correct(card.year, position);
        if correct {
            timeline.insert(card.clone(), position)?;
        }
        self.clear_current_card();
        log::debug!(
            "Player {player_id} placed {card} at {position}: {}",
            if correct { "correct" } else { "incorrect" }
        );
        Ok(Placement {
            card,
            position,
            correct,
        })
    }

    /// Runs a whole turn: place, then check for a winner, then pass the turn
    /// and deal the next card.
    pub fn play_turn<R: Rng + ?Sized>(
        &mut self,
        player_id: PlayerId,
        position: usize,
        rng: &mut R,
    ) -> Result<TurnReport, GameError> {
        let placement = self.place_card(player_id, position)?;
        let mut events = vec![GameEvent::CardPlaced {
            player_id,
            player_name: self.player_name(player_id),
            year: placement.card.year,
            correct: placement.correct,
        }];

        let end = if let Some(winner) = self.check_winner() {
            log::info!("Game {} won by {winner}", self.game.id);
            events.push(GameEvent::GameFinished {
                winner: Some(winner),
                winner_name: Some(self.player_name(winner)),
                reason: FinishReason::Winner,
            });
            TurnEnd::Won(winner)
        } else {
            match self.advance_turn() {
                Err(_) => {
                    events.push(self.finish_without_winner(FinishReason::NoActivePlayers));
                    TurnEnd::NoActivePlayers
                }
                Ok(next) => {
                    events.push(GameEvent::TurnAdvanced { player_id: next });
                    match self.draw_random(rng) {
                        Ok(card) => TurnEnd::Next {
                            player: next,
                            card: card.clone(),
                        },
                        Err(DrawPileExhausted) => {
                            events.push(self.finish_without_winner(FinishReason::DrawPileExhausted));
                            TurnEnd::Exhausted
                        }
                    }
                }
            }
        };

        Ok(TurnReport {
            placement,
            end,
            events,
        })
    }

    /// Marks a player inactive. If it was their turn in a running game, the
    /// turn passes on and the undelivered card stays current for the next player.
    pub fn player_left(&mut self, player_id: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let mut players = self.roster.players().to_vec();
        let player = players
            .iter_mut()
            .find(|player| player.id == player_id)
            .ok_or(GameError::PlayerNotInGame(player_id))?;
        player.is_active = false;
        self.roster = Roster::new(players);

        let mut events = vec![GameEvent::RosterChanged];
        if self.game.status == GameStatus::Active && self.game.current_player_id == Some(player_id) {
            match self.advance_turn() {
                Ok(next) => events.push(GameEvent::TurnAdvanced { player_id: next }),
                Err(_) => events.push(self.finish_without_winner(FinishReason::NoActivePlayers)),
            }
        }
        Ok(events)
    }

    /// Returns a finished game to the waiting state with every card back in the pile.
    pub fn reset(&mut self) -> Result<Vec<GameEvent>, GameError> {
        if self.game.status != GameStatus::Finished {
            return Err(GameError::NotFinished);
        }
        for timeline in self.timelines.values_mut() {
            timeline.clear();
        }
        self.draw_pile.replenish_all();
        self.game.current_card = None;
        self.game.current_player_id = None;
        self.game.winner_id = None;
        self.game.status = GameStatus::Waiting;
        log::info!("Game {} reset", self.game.id);
        Ok(vec![GameEvent::GameReset])
    }

    fn player_name(&self, player_id: PlayerId) -> String {
        self.roster
            .get(player_id)
            .map(|player| player.name.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        card::{CardCategory, EventCard},
        ids::{CardId, DeckId, UserId},
        roster::RosterPlayer,
    };
    use rand::{rngs::StdRng, SeedableRng};

    fn players(count: u32) -> Vec<RosterPlayer> {
        (1..=count)
            .map(|join_order| RosterPlayer {
                id: PlayerId::new(),
                user_id: UserId::new(),
                name: format!("Player {join_order}"),
                join_order,
                is_active: true,
            })
            .collect()
    }

    fn pile_of(years: &[u16]) -> DrawPile {
        let deck = DeckId::new();
        let cards: Vec<_> = years
            .iter()
            .map(|year| EventCard {
                id: CardId::new(),
                deck_id: deck,
                category: CardCategory::Prompt,
                text: format!("Something happened in {year}"),
            })
            .collect();
        let mut pile = DrawPile::initialize(&[deck], &cards).unwrap();
        pile.resolve_years();
        pile
    }

    fn game_with(years: &[u16], roster: Vec<RosterPlayer>, cards_to_win: u32) -> ChronologyGame {
        let game = Game::new(LobbyId::new(), cards_to_win).unwrap();
        ChronologyGame::new(game, pile_of(years), Roster::new(roster))
    }

    /// The position where the current card belongs in `player`'s timeline.
    fn correct_position(game: &ChronologyGame, player: PlayerId) -> usize {
        let year = game.current_card().unwrap().year;
        game.timeline(player)
            .map(|timeline| timeline.years().iter().filter(|y| **y <= year).count())
            .unwrap_or(0)
    }

    fn wrong_position(game: &ChronologyGame, player: PlayerId) -> Option<usize> {
        let year = game.current_card().unwrap().year;
        let years = game.timeline(player).unwrap().years();
        (0..=years.len()).find(|p| !crate::timeline::placement_is_correct(year, *p, &years))
    }

    #[test]
    fn test_new_game_rejects_zero_threshold() {
        assert_eq!(
            Game::new(LobbyId::new(), 0).unwrap_err(),
            GameError::InvalidThreshold(0)
        );
    }

    #[test]
    fn test_status_text() {
        for status in [GameStatus::Waiting, GameStatus::Active, GameStatus::Finished] {
            assert_eq!(status.to_string().parse::<GameStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_start_deals_one_card_each_and_draws_opening_card() {
        let roster = players(3);
        let ids: Vec<_> = roster.iter().map(|p| p.id).collect();
        let mut game = game_with(&[1100, 1200, 1300, 1400, 1500], roster, 5);
        let mut rng = StdRng::seed_from_u64(1);

        let report = game.start(&mut rng).unwrap();
        assert_eq!(report.first_player, ids[0]);
        assert!(report.opening_card.is_some());
        assert_eq!(report.events, vec![GameEvent::GameStarted { first_player: ids[0] }]);
        assert_eq!(game.status(), GameStatus::Active);
        assert_eq!(game.current_player(), Some(ids[0]));
        for id in &ids {
            assert_eq!(game.timeline_size(*id), 1);
        }
        assert_eq!(game.draw_pile.undrawn_count(), 1);
    }

    #[test]
    fn test_start_requires_enough_cards() {
        let mut game = game_with(&[1100, 1200], players(3), 5);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            game.start(&mut rng).unwrap_err(),
            GameError::InsufficientCards {
                needed: 3,
                available: 2
            }
        );
        assert_eq!(game.status(), GameStatus::Waiting);
        assert_eq!(game.draw_pile.undrawn_count(), 2);
    }

    #[test]
    fn test_start_requires_active_players_and_waiting_status() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty = game_with(&[1100], Vec::new(), 5);
        assert_eq!(empty.start(&mut rng).unwrap_err(), GameError::NoActivePlayers);

        let mut game = game_with(&[1100, 1200, 1300], players(1), 5);
        game.start(&mut rng).unwrap();
        assert_eq!(game.start(&mut rng).unwrap_err(), GameError::AlreadyStarted);
    }

    #[test]
    fn test_start_with_exact_cards_finishes_without_winner() {
        let mut game = game_with(&[1100, 1200], players(2), 5);
        let mut rng = StdRng::seed_from_u64(1);
        let report = game.start(&mut rng).unwrap();
        assert_eq!(report.opening_card, None);
        assert_eq!(game.status(), GameStatus::Finished);
        assert_eq!(game.game.winner_id, None);
        assert_eq!(game.current_player(), None);
    }

    #[test]
    fn test_place_rejects_wrong_player_and_bad_position_without_consuming_card() {
        let roster = players(2);
        let ids: Vec<_> = roster.iter().map(|p| p.id).collect();
        let mut game = game_with(&[1100, 1200, 1300, 1400], roster, 5);
        let mut rng = StdRng::seed_from_u64(3);
        game.start(&mut rng).unwrap();
        let card = game.current_card().cloned();

        assert_eq!(
            game.place_card(ids[1], 0).unwrap_err(),
            GameError::NotYourTurn(ids[1])
        );
        assert_eq!(
            game.place_card(ids[0], 5).unwrap_err(),
            GameError::InvalidPosition { position: 5, len: 1 }
        );
        assert_eq!(game.current_card().cloned(), card);
    }

    #[test]
    fn test_incorrect_placement_consumes_card_and_passes_turn() {
        let roster = players(2);
        let ids: Vec<_> = roster.iter().map(|p| p.id).collect();
        let mut game = game_with(&[1100, 1200, 1300, 1400, 1500], roster, 5);
        let mut rng = StdRng::seed_from_u64(5);
        game.start(&mut rng).unwrap();
        let position = wrong_position(&game, ids[0]).unwrap();

        let report = game.play_turn(ids[0], position, &mut rng).unwrap();
        assert!(!report.placement.correct);
        assert_eq!(game.timeline_size(ids[0]), 1);
        assert!(matches!(report.end, TurnEnd::Next { player, .. } if player == ids[1]));
        assert_eq!(game.current_player(), Some(ids[1]));
        assert!(game.current_card().is_some());
    }

    #[test]
    fn test_correct_placement_grows_timeline_in_order() {
        let roster = players(1);
        let id = roster[0].id;
        let mut game = game_with(&[1100, 1200, 1300, 1400, 1500], roster, 5);
        let mut rng = StdRng::seed_from_u64(11);
        game.start(&mut rng).unwrap();

        let position = correct_position(&game, id);
        let report = game.play_turn(id, position, &mut rng).unwrap();
        assert!(report.placement.correct);
        assert_eq!(game.timeline_size(id), 2);
        let years = game.timeline(id).unwrap().years();
        assert!(years.windows(2).all(|pair| pair[0] <= pair[1]));
        // A lone player keeps the turn.
        assert_eq!(game.current_player(), Some(id));
    }

    #[test]
    fn test_reaching_threshold_wins_and_stops_dealing() {
        let roster = players(2);
        let ids: Vec<_> = roster.iter().map(|p| p.id).collect();
        let mut game = game_with(&[1100, 1200, 1300, 1400, 1500, 1600], roster, 2);
        let mut rng = StdRng::seed_from_u64(13);
        game.start(&mut rng).unwrap();

        let position = correct_position(&game, ids[0]);
        let report = game.play_turn(ids[0], position, &mut rng).unwrap();
        assert_eq!(report.end, TurnEnd::Won(ids[0]));
        assert_eq!(game.status(), GameStatus::Finished);
        assert_eq!(game.game.winner_id, Some(ids[0]));
        assert_eq!(game.current_player(), None);
        assert_eq!(game.current_card(), None);
        assert_eq!(game.check_winner(), Some(ids[0]));
        assert_eq!(
            game.play_turn(ids[1], 0, &mut rng).unwrap_err(),
            GameError::NoCardToPlace
        );
    }

    #[test]
    fn test_earliest_joined_player_wins_ties() {
        let roster = players(2);
        let ids: Vec<_> = roster.iter().map(|p| p.id).collect();
        let mut game = game_with(&[1100, 1200, 1300], roster, 1);
        let mut rng = StdRng::seed_from_u64(17);
        game.start(&mut rng).unwrap();
        assert_eq!(game.check_winner(), Some(ids[0]));
    }

    #[test]
    fn test_exhausted_pile_finishes_without_winner() {
        let roster = players(1);
        let id = roster[0].id;
        let mut game = game_with(&[1100, 1200], roster, 5);
        let mut rng = StdRng::seed_from_u64(19);
        game.start(&mut rng).unwrap();

        let position = correct_position(&game, id);
        let report = game.play_turn(id, position, &mut rng).unwrap();
        assert_eq!(report.end, TurnEnd::Exhausted);
        assert_eq!(game.status(), GameStatus::Finished);
        assert_eq!(game.game.winner_id, None);
        assert!(report.events.iter().any(|event| matches!(
            event,
            GameEvent::GameFinished {
                reason: FinishReason::DrawPileExhausted,
                ..
            }
        )));
    }

    #[test]
    fn test_current_player_leaving_passes_turn() {
        let roster = players(2);
        let ids: Vec<_> = roster.iter().map(|p| p.id).collect();
        let mut game = game_with(&[1100, 1200, 1300, 1400], roster, 5);
        let mut rng = StdRng::seed_from_u64(23);
        game.start(&mut rng).unwrap();
        let card = game.current_card().cloned();

        let events = game.player_left(ids[0]).unwrap();
        assert_eq!(
            events,
            vec![GameEvent::RosterChanged, GameEvent::TurnAdvanced { player_id: ids[1] }]
        );
        assert_eq!(game.current_player(), Some(ids[1]));
        assert_eq!(game.current_card().cloned(), card);

        game.player_left(ids[1]).unwrap();
        assert_eq!(game.status(), GameStatus::Finished);
        assert_eq!(game.game.winner_id, None);
    }

    #[test]
    fn test_reset_restores_waiting_state() {
        let roster = players(2);
        let ids: Vec<_> = roster.iter().map(|p| p.id).collect();
        let mut game = game_with(&[1100, 1200, 1300, 1400], roster, 1);
        let mut rng = StdRng::seed_from_u64(29);

        assert_eq!(game.reset().unwrap_err(), GameError::NotFinished);
        game.start(&mut rng).unwrap();
        game.check_winner();
        assert_eq!(game.reset().unwrap(), vec![GameEvent::GameReset]);

        assert_eq!(game.status(), GameStatus::Waiting);
        assert_eq!(game.game.winner_id, None);
        assert_eq!(game.current_player(), None);
        assert_eq!(game.current_card(), None);
        assert_eq!(game.draw_pile.undrawn_count(), 4);
        assert!(ids.iter().all(|id| game.timeline_size(*id) == 0));

        game.start(&mut rng).unwrap();
        assert_eq!(game.status(), GameStatus::Active);
    }
}
