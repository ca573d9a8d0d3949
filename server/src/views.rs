//! JSON snapshots returned by the read endpoints.

use database::{LobbyRecord, LobbySummary};
use serde::Serialize;
use types::{
    CardId, ChronologyGame, DatedCard, GameId, GameStatus, LobbyId, PlayerId, RosterPlayer,
    StartReport, TimelineEntry, TurnEnd, TurnReport, UserId,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub user_id: UserId,
    pub name: String,
    pub join_order: u32,
    pub timeline_size: usize,
    pub is_current: bool,
}

impl PlayerView {
    fn new(game: &ChronologyGame, player: &RosterPlayer) -> Self {
        Self {
            player_id: player.id,
            user_id: player.user_id,
            name: player.name.clone(),
            join_order: player.join_order,
            timeline_size: game.timeline_size(player.id),
            is_current: game.current_player() == Some(player.id),
        }
    }
}

fn active_player_views(game: &ChronologyGame) -> Vec<PlayerView> {
    game.roster
        .active_players()
        .map(|player| PlayerView::new(game, player))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayersView {
    pub players: Vec<PlayerView>,
    pub cards_to_win: u32,
}

impl PlayersView {
    pub fn new(game: &ChronologyGame) -> Self {
        Self {
            players: active_player_views(game),
            cards_to_win: game.game.cards_to_win,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineCardView {
    pub card_id: CardId,
    pub text: String,
    pub year: u16,
    pub position: usize,
}

impl From<&TimelineEntry> for TimelineCardView {
    fn from(entry: &TimelineEntry) -> Self {
        Self {
            card_id: entry.card.card_id,
            text: entry.card.text.clone(),
            year: entry.card.year,
            position: entry.position,
        }
    }
}

fn timeline_cards(game: &ChronologyGame, player_id: PlayerId) -> Vec<TimelineCardView> {
    game.timeline(player_id)
        .map(|timeline| timeline.entries().iter().map(TimelineCardView::from).collect())
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerTimelineView {
    pub player_id: PlayerId,
    pub name: String,
    pub is_me: bool,
    pub is_current: bool,
    pub cards: Vec<TimelineCardView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelinesView {
    pub timelines: Vec<PlayerTimelineView>,
}

impl TimelinesView {
    /// Every active player's timeline, the player whose turn it is first.
    pub fn new(game: &ChronologyGame, viewer: &RosterPlayer) -> Self {
        let mut timelines: Vec<PlayerTimelineView> = game
            .roster
            .active_players()
            .map(|player| PlayerTimelineView {
                player_id: player.id,
                name: player.name.clone(),
                is_me: player.id == viewer.id,
                is_current: game.current_player() == Some(player.id),
                cards: timeline_cards(game, player.id),
            })
            .collect();
        // stable, so the rest keep join order
        timelines.sort_by_key(|timeline| !timeline.is_current);
        Self { timelines }
    }
}

/// The card waiting to be placed. Its year stays hidden until it is placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CurrentCardView {
    pub card_id: CardId,
    pub text: String,
}

impl From<&DatedCard> for CurrentCardView {
    fn from(card: &DatedCard) -> Self {
        Self {
            card_id: card.card_id,
            text: card.text.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WinnerView {
    pub player_id: PlayerId,
    pub user_id: UserId,
    pub name: String,
}

impl WinnerView {
    fn new(game: &ChronologyGame) -> Option<Self> {
        let player = game.roster.get(game.game.winner_id?)?;
        Some(Self {
            player_id: player.id,
            user_id: player.user_id,
            name: player.name.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GameStateView {
    pub lobby_id: LobbyId,
    pub game_id: GameId,
    pub status: GameStatus,
    pub cards_to_win: u32,
    pub draw_pile_count: usize,
    pub current_player: Option<PlayerView>,
    pub is_my_turn: bool,
    pub current_card: Option<CurrentCardView>,
    pub winner: Option<WinnerView>,
    pub players: Vec<PlayerView>,
    pub my_timeline: Vec<TimelineCardView>,
}

impl GameStateView {
    pub fn new(game: &ChronologyGame, viewer: &RosterPlayer) -> Self {
        let players = active_player_views(game);
        let current_player = players.iter().find(|player| player.is_current).cloned();
        Self {
            lobby_id: game.game.lobby_id,
            game_id: game.id(),
            status: game.status(),
            cards_to_win: game.game.cards_to_win,
            draw_pile_count: game.draw_pile.undrawn_count(),
            is_my_turn: game.current_player() == Some(viewer.id),
            current_player,
            current_card: game.current_card().map(CurrentCardView::from),
            winner: WinnerView::new(game),
            players,
            my_timeline: timeline_cards(game, viewer.id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StartView {
    pub message: String,
    pub first_player: PlayerId,
    pub status: GameStatus,
}

impl From<&StartReport> for StartView {
    fn from(report: &StartReport) -> Self {
        let (message, status) = match report.opening_card {
            Some(_) => ("Game started!", GameStatus::Active),
            None => ("Game started, but the draw pile is empty.", GameStatus::Finished),
        };
        Self {
            message: message.to_string(),
            first_player: report.first_player,
            status,
        }
    }
}

/// What the placing player is told about their turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnResultView {
    pub correct: bool,
    pub year: u16,
    pub message: String,
    pub winner: Option<PlayerId>,
    pub next_player: Option<PlayerId>,
}

impl From<&TurnReport> for TurnResultView {
    fn from(report: &TurnReport) -> Self {
        let correct = report.placement.correct;
        let verdict = if correct { "Correct!" } else { "Incorrect." };
        let (message, winner, next_player) = match &report.end {
            TurnEnd::Won(winner) => ("You win!".to_string(), Some(*winner), None),
            TurnEnd::Next { player, .. } => {
                (format!("{verdict} Next player's turn."), None, Some(*player))
            }
            TurnEnd::Exhausted => (format!("{verdict} No more cards."), None, None),
            TurnEnd::NoActivePlayers => (format!("{verdict} No players left."), None, None),
        };
        Self {
            correct,
            year: report.placement.card.year,
            message,
            winner,
            next_player,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub message: String,
}

impl MessageView {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LobbyCreatedView {
    pub lobby_id: LobbyId,
    pub name: String,
    pub redirect: String,
}

impl From<&LobbyRecord> for LobbyCreatedView {
    fn from(lobby: &LobbyRecord) -> Self {
        Self {
            lobby_id: lobby.id,
            name: lobby.name.clone(),
            redirect: lobby_path(lobby.id),
        }
    }
}

pub fn lobby_path(lobby_id: LobbyId) -> String {
    format!("/chronology/{lobby_id}")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchView {
    pub lobbies: Vec<LobbySummary>,
    pub page: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl SearchView {
    pub fn new(lobbies: Vec<LobbySummary>, page: u32, page_size: u32, total: u64) -> Self {
        Self {
            lobbies,
            page,
            total,
            total_pages: total.div_ceil(u64::from(page_size.max(1))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use types::{DrawPile, DrawPileEntry, Game, Roster};

    fn player(name: &str, join_order: u32) -> RosterPlayer {
        RosterPlayer {
            id: PlayerId::new(),
            user_id: UserId::new(),
            name: name.to_string(),
            join_order,
            is_active: true,
        }
    }

    fn started_game(players: Vec<RosterPlayer>) -> ChronologyGame {
        let entries = (0..6)
            .map(|i| DrawPileEntry {
                card_id: CardId::new(),
                text: format!("Event {}", 1900 + i * 10),
                year: 1900 + i * 10,
                drawn: false,
            })
            .collect();
        let game = Game::new(LobbyId::new(), 5).unwrap();
        let mut game = ChronologyGame::new(game, DrawPile::from_entries(entries), Roster::new(players));
        game.start(&mut StdRng::seed_from_u64(3)).unwrap();
        game
    }

    #[test]
    fn test_state_hides_current_card_year() {
        let ada = player("Ada", 1);
        let game = started_game(vec![ada.clone(), player("Bo", 2)]);
        let view = GameStateView::new(&game, &ada);
        assert!(view.is_my_turn);
        assert_eq!(view.draw_pile_count, 3);
        assert_eq!(view.my_timeline.len(), 1);

        let json = serde_json::to_value(&view.current_card).unwrap();
        assert!(json.get("text").is_some());
        assert!(json.get("year").is_none());
    }

    #[test]
    fn test_timelines_put_current_player_first() {
        let ada = player("Ada", 1);
        let bo = player("Bo", 2);
        let mut game = started_game(vec![ada.clone(), bo.clone()]);
        game.set_current_player(bo.id);

        let view = TimelinesView::new(&game, &ada);
        let names: Vec<_> = view.timelines.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Bo", "Ada"]);
        assert!(view.timelines[1].is_me);
        assert!(!view.timelines[0].is_me);
    }

    #[test]
    fn test_search_page_count() {
        assert_eq!(SearchView::new(Vec::new(), 1, 10, 0).total_pages, 0);
        assert_eq!(SearchView::new(Vec::new(), 1, 10, 10).total_pages, 1);
        assert_eq!(SearchView::new(Vec::new(), 2, 10, 12).total_pages, 2);
    }
}
