use types::DeckId;
use uuid::Uuid;

pub const DEFAULT_DECK_NAME: &str = "Chronology Classics";

const DEFAULT_DECK_UUID: Uuid = Uuid::from_u128(0x8802_6803_d22a_11f0_b4d2_60cf_8464_9547);

pub fn default_deck_id() -> DeckId {
    DeckId::from_uuid(DEFAULT_DECK_UUID)
}

/// Prompt cards seeded into every store. Cards without a year in their text
/// are kept on purpose; they are dropped when a draw pile resolves years.
pub const DEFAULT_DECK_CARDS: &[&str] = &[
    "The Battle of Hastings is fought (1066)",
    "The Magna Carta is sealed at Runnymede (1215)",
    "Marco Polo returns to Venice from China (1295)",
    "The Black Death reaches Europe (1347)",
    "Gutenberg prints his Bible (1455)",
    "Columbus lands in the Bahamas (1492)",
    "Leonardo da Vinci begins the Mona Lisa (1503)",
    "Martin Luther posts his Ninety-five Theses (1517)",
    "Copernicus publishes his heliocentric model (1543)",
    "The Spanish Armada is defeated (1588)",
    "Shakespeare's Hamlet is first performed (1600)",
    "Galileo observes the moons of Jupiter (1610)",
    "The Mayflower lands at Plymouth (1620)",
    "The Great Fire of London (1666)",
    "Newton publishes the Principia (1687)",
    "The American Declaration of Independence is signed (1776)",
    "The storming of the Bastille (1789)",
    "Napoleon is defeated at Waterloo (1815)",
    "Darwin publishes On the Origin of Species (1859)",
    "The first transcontinental railroad in the US is completed (1869)",
    "Alexander Graham Bell patents the telephone (1876)",
    "The Eiffel Tower opens (1889)",
    "The Wright brothers make the first powered flight (1903)",
    "The Titanic sinks (1912)",
    "Penicillin is discovered by Alexander Fleming (1928)",
    "The Second World War ends (1945)",
    "The structure of DNA is described (1953)",
    "Sputnik becomes the first artificial satellite (1957)",
    "Apollo 11 lands on the Moon (1969)",
    "The Berlin Wall falls (1989)",
    "The World Wide Web is proposed at CERN (1989)",
    "The first iPhone goes on sale (2007)",
    "A mammoth is painted on a cave wall, long before writing",
];
