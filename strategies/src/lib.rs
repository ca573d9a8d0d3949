pub mod input_strategy;

use rand::{rngs::StdRng, Rng, SeedableRng};
use types::{PlacementStrategy, TurnView};

pub use crate::input_strategy::InputStrategy;

/// Places every card at a uniformly random position.
#[derive(Debug)]
pub struct RandomStrategy {
    rng: StdRng,
}

impl RandomStrategy {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl PlacementStrategy for RandomStrategy {
    fn select_position(&mut self, view: &TurnView) -> usize {
        self.rng.gen_range(0..=view.timeline.len())
    }
}

/// Knows every year and always places correctly.
#[derive(Debug, Default)]
pub struct DefaultStrategy {}

impl PlacementStrategy for DefaultStrategy {
    fn select_position(&mut self, view: &TurnView) -> usize {
        view.correct_position()
    }
}

/// Places correctly with probability `accuracy`, otherwise picks a wrong slot
/// when one exists.
#[derive(Debug)]
pub struct FallibleStrategy {
    accuracy: f64,
    rng: StdRng,
}

impl FallibleStrategy {
    pub fn new(accuracy: f64, seed: u64) -> Self {
        Self {
            accuracy: accuracy.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PlacementStrategy for FallibleStrategy {
    fn select_position(&mut self, view: &TurnView) -> usize {
        let correct = view.correct_position();
        if self.rng.gen_bool(self.accuracy) {
            return correct;
        }
        let wrong: Vec<usize> = (0..=view.timeline.len())
            .filter(|position| !types::placement_is_correct(view.card.year, *position, &view.timeline))
            .collect();
        if wrong.is_empty() {
            log::debug!("No wrong position available for {}", view.card);
            return correct;
        }
        wrong[self.rng.gen_range(0..wrong.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{CardId, DatedCard, PlayerId};

    fn view(year: u16, timeline: Vec<u16>) -> TurnView {
        TurnView {
            player_id: PlayerId::new(),
            player_name: "Bot".to_string(),
            card: DatedCard {
                card_id: CardId::new(),
                text: "Something".to_string(),
                year,
            },
            timeline,
            cards_to_win: 5,
        }
    }

    #[test]
    fn test_default_strategy_is_always_correct() {
        let mut strategy = DefaultStrategy::default();
        for (year, timeline) in [
            (1500, vec![]),
            (1500, vec![1400, 1600]),
            (1700, vec![1400, 1600]),
            (1600, vec![1400, 1600, 1600]),
        ] {
            let view = view(year, timeline);
            let position = strategy.select_position(&view);
            assert!(types::placement_is_correct(year, position, &view.timeline));
        }
    }

    #[test]
    fn test_random_strategy_stays_in_bounds() {
        let mut strategy = RandomStrategy::seeded(3);
        let view = view(1500, vec![1100, 1200, 1300]);
        for _ in 0..100 {
            assert!(strategy.select_position(&view) <= 3);
        }
    }

    #[test]
    fn test_fallible_strategy_with_zero_accuracy_misplaces() {
        let mut strategy = FallibleStrategy::new(0.0, 9);
        let view = view(1500, vec![1100, 1900]);
        for _ in 0..20 {
            let position = strategy.select_position(&view);
            assert!(!types::placement_is_correct(1500, position, &view.timeline));
        }
        // An empty timeline has no wrong slot.
        assert_eq!(strategy.select_position(&self::view(1500, vec![])), 0);
    }
}
