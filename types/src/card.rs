use std::{fmt::Display, str::FromStr, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ids::{CardId, DeckId};

pub const MIN_YEAR: u16 = 1000;
pub const MAX_YEAR: u16 = 2999;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardCategory {
    Prompt,
    Response,
}

impl Display for CardCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardCategory::Prompt => write!(f, "PROMPT"),
            CardCategory::Response => write!(f, "RESPONSE"),
        }
    }
}

impl FromStr for CardCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROMPT" => Ok(CardCategory::Prompt),
            "RESPONSE" => Ok(CardCategory::Response),
            other => Err(format!("unknown card category: {other}")),
        }
    }
}

/// A card as it lives in a content deck, before any year has been read from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCard {
    pub id: CardId,
    pub deck_id: DeckId,
    pub category: CardCategory,
    pub text: String,
}

impl EventCard {
    /// Only prompt cards describe events that can be dated.
    pub fn is_eligible(&self) -> bool {
        self.category == CardCategory::Prompt
    }
}

/// A card whose year has been resolved. This is what gets drawn and placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedCard {
    pub card_id: CardId,
    pub text: String,
    pub year: u16,
}

impl Display for DatedCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.text, self.year)
    }
}

fn year_regex() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    // ASCII digits and ASCII word boundaries only.
    YEAR.get_or_init(|| {
        Regex::new(r"(?-u:\b)([12][0-9]{3})(?-u:\b)").expect("Valid year regex")
    })
}

/// Returns the first standalone four digit year between 1000 and 2999 in `text`.
pub fn parse_year(text: &str) -> Option<u16> {
    year_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .filter(|year| (MIN_YEAR..=MAX_YEAR).contains(year))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_takes_first_match() {
        assert_eq!(parse_year("Moon landing 1969, shuttle 1981"), Some(1969));
        assert_eq!(parse_year("1066: Battle of Hastings"), Some(1066));
        assert_eq!(parse_year("Ends with 2999"), Some(2999));
    }

    #[test]
    fn test_parse_year_ignores_out_of_range_and_embedded_digits() {
        assert_eq!(parse_year("In 999 nothing happened"), None);
        assert_eq!(parse_year("Year 3000 is the future"), None);
        assert_eq!(parse_year("Serial 12345 is not a year"), None);
        assert_eq!(parse_year("the 1960s"), None);
        assert_eq!(parse_year("no digits at all"), None);
    }

    #[test]
    fn test_parse_year_skips_non_years_before_a_year() {
        assert_eq!(parse_year("Code 0042 then 1815 Waterloo"), Some(1815));
        assert_eq!(parse_year("3456 and later 2001"), Some(2001));
    }

    #[test]
    fn test_parse_year_uses_ascii_boundaries_and_digits() {
        assert_eq!(parse_year("1969年7月 Apollo 11"), Some(1969));
        assert_eq!(parse_year("Révolution française, 1789"), Some(1789));
        assert_eq!(parse_year("Code 1\u{0662}\u{0663}\u{0664}, then 1969"), Some(1969));
        assert_eq!(parse_year("\u{0661}\u{0669}\u{0666}\u{0669}"), None);
    }

    #[test]
    fn test_card_category_round_trips_through_text() {
        for category in [CardCategory::Prompt, CardCategory::Response] {
            assert_eq!(category.to_string().parse::<CardCategory>(), Ok(category));
        }
        assert!("JOKER".parse::<CardCategory>().is_err());
    }
}
