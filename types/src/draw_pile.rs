use rand::seq::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    card::{parse_year, DatedCard, EventCard},
    error::{DrawPileExhausted, GameError},
    ids::{CardId, DeckId},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawPileEntry {
    pub card_id: CardId,
    pub text: String,
    pub year: u16,
    pub drawn: bool,
}

impl DrawPileEntry {
    pub fn dated_card(&self) -> DatedCard {
        DatedCard {
            card_id: self.card_id,
            text: self.text.clone(),
            year: self.year,
        }
    }
}

/// The cards a game can still deal from.
///
/// Cards enter through [`DrawPile::initialize`] and only become entries once
/// [`DrawPile::resolve_years`] has found a year for them, so every entry
/// carries a valid year.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawPile {
    entries: Vec<DrawPileEntry>,
    unresolved: Vec<EventCard>,
}

impl DrawPile {
    /// Seeds a pile from every eligible card belonging to `deck_ids`.
    pub fn initialize(deck_ids: &[DeckId], cards: &[EventCard]) -> Result<Self, GameError> {
        if deck_ids.is_empty() {
            return Err(GameError::NoDecksProvided);
        }
        let mut unresolved: Vec<EventCard> = Vec::new();
        for card in cards {
            let wanted = card.is_eligible() && deck_ids.contains(&card.deck_id);
            if wanted && !unresolved.iter().any(|c| c.id == card.id) {
                unresolved.push(card.clone());
            }
        }
        log::debug!(
            "Seeded draw pile with {} candidate cards from {} decks",
            unresolved.len(),
            deck_ids.len()
        );
        Ok(Self {
            entries: Vec::new(),
            unresolved,
        })
    }

    /// Rebuilds a pile from stored entries.
    pub fn from_entries(entries: Vec<DrawPileEntry>) -> Self {
        Self {
            entries,
            unresolved: Vec::new(),
        }
    }

    /// Reads a year out of every unresolved card; cards without one are
    /// dropped. Returns how many were dropped. Running it again is a no-op.
    pub fn resolve_years(&mut self) -> usize {
        let mut dropped = 0;
        for card in self.unresolved.drain(..) {
            match parse_year(&card.text) {
                Some(year) => self.entries.push(DrawPileEntry {
                    card_id: card.id,
                    text: card.text,
                    year,
                    drawn: false,
                }),
                None => {
                    log::debug!("Dropping card without a year: {:?}", card.text);
                    dropped += 1;
                }
            }
        }
        dropped
    }

    /// Picks an undrawn entry uniformly at random and marks it drawn.
    pub fn draw_random<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<DatedCard, DrawPileExhausted> {
        let entry = self
            .entries
            .iter_mut()
            .filter(|entry| !entry.drawn)
            .choose(rng)
            .ok_or(DrawPileExhausted)?;
        entry.drawn = true;
        Ok(entry.dated_card())
    }

    pub fn undrawn_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.drawn).count()
    }

    pub fn replenish_all(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.drawn = false;
        }
    }

    pub fn entries(&self) -> &[DrawPileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
