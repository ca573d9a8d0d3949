use std::io::{self, Write};

use itertools::Itertools;
use regex::Regex;
use types::{PlacementStrategy, TurnView};

/// Asks a human on stdin where to place each card.
#[derive(Debug, Default)]
pub struct InputStrategy {}

impl PlacementStrategy for InputStrategy {
    fn select_position(&mut self, view: &TurnView) -> usize {
        print_turn(view);

        // nowhere to choose
        if view.timeline.is_empty() {
            log::info!("Empty timeline, placing at 0");
            return 0;
        }

        let mut buf = String::new();
        loop {
            match select_position_from_stdin(&mut buf, view) {
                Ok(position) => return position,
                Err(err) => {
                    buf.clear();
                    log::error!("Error parsing message from stdin: {err}")
                }
            }
        }
    }
}

fn print_turn(view: &TurnView) {
    println!(
        "{}'s timeline ({} of {} cards): [ {} ]",
        view.player_name,
        view.timeline.len(),
        view.cards_to_win,
        view.timeline
            .iter()
            .enumerate()
            .map(|(position, year)| format!("{position}: {year}"))
            .join(", ")
    );
    println!("Card to place: {}", view.card.text);
}

fn select_position_from_stdin(buf: &mut String, view: &TurnView) -> Result<usize, String> {
    print!("Position? (0-{}, first, last, before/after <year>) >> ", view.timeline.len());
    let _ = io::stdout().flush();
    match io::stdin().read_line(buf) {
        Ok(_) => position_from_str(buf, &view.timeline),
        Err(err) => {
            buf.clear();
            Err(format!("Error reading line from stdin: {err}"))
        }
    }
}

fn position_from_str(input: &str, timeline: &[u16]) -> Result<usize, String> {
    let input = input.trim().to_lowercase();
    let len = timeline.len();

    match input.as_str() {
        "first" => return Ok(0),
        "last" => return Ok(len),
        _ => {}
    }

    let number_re = Regex::new(r"^(?:place |put )?(?<position>\d+)$").expect("Valid position regex");
    if let Some(caps) = number_re.captures(&input) {
        let position: usize = caps["position"]
            .parse()
            .map_err(|e| format!("Invalid position {:?}: {e}", &caps["position"]))?;
        if position > len {
            return Err(format!("Position {position} is past the end of the timeline ({len})"));
        }
        return Ok(position);
    }

    let relative_re =
        Regex::new(r"^(?<direction>before|after) (?<year>\d{4})$").expect("Valid relative regex");
    if let Some(caps) = relative_re.captures(&input) {
        let year: u16 = caps["year"]
            .parse()
            .map_err(|e| format!("Invalid year {:?}: {e}", &caps["year"]))?;
        let index = timeline
            .iter()
            .position(|placed| *placed == year)
            .ok_or_else(|| format!("No card from {year} in the timeline"))?;
        return Ok(if &caps["direction"] == "before" {
            index
        } else {
            index + 1
        });
    }

    Err(format!("Unable to parse a position from string: {input}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_positions() {
        let timeline = [1800, 1900];
        assert_eq!(position_from_str("1\n", &timeline), Ok(1));
        assert_eq!(position_from_str("place 2", &timeline), Ok(2));
        assert!(position_from_str("3", &timeline).is_err());
    }

    #[test]
    fn test_named_and_relative_positions() {
        let timeline = [1800, 1900];
        assert_eq!(position_from_str("First", &timeline), Ok(0));
        assert_eq!(position_from_str("last", &timeline), Ok(2));
        assert_eq!(position_from_str("before 1900", &timeline), Ok(1));
        assert_eq!(position_from_str("after 1900", &timeline), Ok(2));
        assert!(position_from_str("after 2000", &timeline).is_err());
        assert!(position_from_str("somewhere", &timeline).is_err());
    }
}
