use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{card::DatedCard, error::GameError, ids::TimelineEntryId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: TimelineEntryId,
    pub card: DatedCard,
    pub position: usize,
    pub placed_at: DateTime<Utc>,
}

/// One player's placed cards, kept ordered by position with no gaps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a timeline from stored entries in any order.
    pub fn from_entries(mut entries: Vec<TimelineEntry>) -> Self {
        entries.sort_by_key(|entry| entry.position);
        for (position, entry) in entries.iter_mut().enumerate() {
            entry.position = position;
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn years(&self) -> Vec<u16> {
        self.entries.iter().map(|entry| entry.card.year).collect()
    }

    /// Inserts `card` at `position`, shifting later entries up by one.
    /// Correctness of the placement is not checked here.
    pub fn insert(&mut self, card: DatedCard, position: usize) -> Result<&TimelineEntry, GameError> {
        let len = self.entries.len();
        if position > len {
            return Err(GameError::InvalidPosition { position, len });
        }
        self.entries.insert(
            position,
            TimelineEntry {
                id: TimelineEntryId::new(),
                card,
                position,
                placed_at: Utc::now(),
            },
        );
        for entry in self.entries.iter_mut().skip(position + 1) {
            entry.position += 1;
        }
        Ok(&self.entries[position])
    }

    pub fn is_correct(&self, year: u16, position: usize) -> bool {
        placement_is_correct(year, position, &self.years())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Whether `year` belongs at `position` in a timeline holding `years`.
/// Equal years are allowed on either side. Positions past the end are never correct.
pub fn placement_is_correct(year: u16, position: usize, years: &[u16]) -> bool {
    if position > years.len() {
        return false;
    }
    let after_previous = position == 0 || years[position - 1] <= year;
    let before_next = position == years.len() || year <= years[position];
    after_previous && before_next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CardId;

    fn dated(year: u16) -> DatedCard {
        DatedCard {
            card_id: CardId::new(),
            text: format!("Event of {year}"),
            year,
        }
    }

    fn timeline_of(years: &[u16]) -> Timeline {
        let mut timeline = Timeline::new();
        for (position, year) in years.iter().enumerate() {
            timeline.insert(dated(*year), position).unwrap();
        }
        timeline
    }

    #[test]
    fn test_placement_rule() {
        let years = [1800, 1900, 2000];
        assert!(placement_is_correct(1700, 0, &years));
        assert!(!placement_is_correct(1850, 0, &years));
        assert!(placement_is_correct(1850, 1, &years));
        assert!(placement_is_correct(1950, 2, &years));
        assert!(placement_is_correct(2020, 3, &years));
        assert!(!placement_is_correct(1950, 3, &years));
        assert!(!placement_is_correct(1950, 4, &years));
    }

    #[test]
    fn test_equal_years_are_correct_on_either_side() {
        let years = [1900];
        assert!(placement_is_correct(1900, 0, &years));
        assert!(placement_is_correct(1900, 1, &years));
    }

    #[test]
    fn test_empty_timeline_accepts_only_position_zero() {
        assert!(placement_is_correct(1500, 0, &[]));
        assert!(!placement_is_correct(1500, 1, &[]));
    }

    #[test]
    fn test_insert_shifts_and_keeps_positions_contiguous() {
        let mut timeline = timeline_of(&[1800, 2000]);
        let inserted = timeline.insert(dated(1900), 1).unwrap();
        assert_eq!(inserted.position, 1);
        assert_eq!(timeline.years(), vec![1800, 1900, 2000]);
        let positions: Vec<_> = timeline.entries().iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_insert_rejects_position_past_end() {
        let mut timeline = timeline_of(&[1800]);
        assert_eq!(
            timeline.insert(dated(1900), 2).unwrap_err(),
            GameError::InvalidPosition { position: 2, len: 1 }
        );
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_from_entries_orders_by_position() {
        let timeline = timeline_of(&[1700, 1800, 1900]);
        let mut shuffled = timeline.entries().to_vec();
        shuffled.reverse();
        assert_eq!(Timeline::from_entries(shuffled), timeline);
    }
}
