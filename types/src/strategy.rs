use std::fmt::Debug;

use crate::{card::DatedCard, ids::PlayerId};

/// What the player whose turn it is can see when placing a card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnView {
    pub player_id: PlayerId,
    pub player_name: String,
    pub card: DatedCard,
    /// Years of the player's own timeline, in position order.
    pub timeline: Vec<u16>,
    pub cards_to_win: u32,
}

impl TurnView {
    /// The leftmost position where the current card would be correct.
    pub fn correct_position(&self) -> usize {
        self.timeline.iter().take_while(|year| **year < self.card.year).count()
    }
}

pub trait PlacementStrategy: Debug + Send {
    /// Picks where to insert the card, from `0` to `view.timeline.len()`.
    fn select_position(&mut self, view: &TurnView) -> usize;
}
