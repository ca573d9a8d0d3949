use serde::{Deserialize, Serialize};

use crate::{
    error::GameError,
    ids::{PlayerId, UserId},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub id: PlayerId,
    pub user_id: UserId,
    pub name: String,
    pub join_order: u32,
    pub is_active: bool,
}

/// Every player who has ever joined a lobby, in join order.
/// Inactive players keep their slot so turn order stays stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    players: Vec<RosterPlayer>,
}

impl Roster {
    pub fn new(mut players: Vec<RosterPlayer>) -> Self {
        players.sort_by_key(|player| player.join_order);
        Self { players }
    }

    pub fn players(&self) -> &[RosterPlayer] {
        &self.players
    }

    pub fn get(&self, id: PlayerId) -> Option<&RosterPlayer> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn active_players(&self) -> impl Iterator<Item = &RosterPlayer> {
        self.players.iter().filter(|player| player.is_active)
    }

    pub fn active_count(&self) -> usize {
        self.active_players().count()
    }

    pub fn is_active(&self, id: PlayerId) -> bool {
        self.get(id).is_some_and(|player| player.is_active)
    }

    /// Finds the next active player after `current`, wrapping around.
    ///
    /// With no current player (or one no longer on the roster) the search
    /// starts from the top. A lone active player is selected again.
    pub fn advance_from(&self, current: Option<PlayerId>) -> Result<PlayerId, GameError> {
        let n = self.players.len();
        let start = current
            .and_then(|id| self.players.iter().position(|player| player.id == id))
            .map_or(0, |index| index + 1);
        (0..n)
            .map(|step| &self.players[(start + step) % n])
            .find(|player| player.is_active)
            .map(|player| player.id)
            .ok_or(GameError::NoActivePlayers)
    }
}
