use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use types::{
    CardCategory, CardId, ChronologyGame, DatedCard, DeckId, DrawPile, DrawPileEntry, EventCard,
    Game, GameStatus, LobbyId, PlayerId, Roster, RosterPlayer, Timeline, TimelineEntry, UserId,
};

use super::traits::{page_offset, GameStore};
use crate::{
    default_deck::{default_deck_id, DEFAULT_DECK_CARDS, DEFAULT_DECK_NAME},
    DatabaseConfig, DatabaseError, DeckRecord, LobbyRecord, LobbySummary,
};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects, migrates and seeds the default deck.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = config
            .create_pool()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        store.seed_default_deck().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }

    pub async fn seed_default_deck(&self) -> Result<(), DatabaseError> {
        let deck_id = default_deck_id();
        let mut tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;
        let inserted = sqlx::query("INSERT OR IGNORE INTO decks (id, name) VALUES (?, ?)")
            .bind(deck_id.to_string())
            .bind(DEFAULT_DECK_NAME)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?
            .rows_affected();
        if inserted == 0 {
            return Ok(());
        }

        let cards: Vec<_> = DEFAULT_DECK_CARDS
            .iter()
            .map(|text| (CardCategory::Prompt, text.to_string()))
            .collect();
        insert_cards(&mut tx, deck_id, &cards).await?;
        tx.commit().await.map_err(DatabaseError::transaction)?;
        tracing::info!(%deck_id, cards = cards.len(), "Seeded default deck");
        Ok(())
    }
}

#[async_trait]
impl GameStore for SqliteStore {
    async fn create_lobby(
        &self,
        lobby: &LobbyRecord,
        game: Option<&ChronologyGame>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;
        sqlx::query(
            "INSERT INTO lobbies (id, name, game_type, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(lobby.id.to_string())
        .bind(&lobby.name)
        .bind(&lobby.game_type)
        .bind(lobby.password_hash.as_deref())
        .bind(lobby.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;
        if let Some(game) = game {
            write_game(&mut tx, game).await?;
        }
        tx.commit().await.map_err(DatabaseError::transaction)?;
        tracing::info!(lobby_id = %lobby.id, name = %lobby.name, "Created lobby");
        Ok(())
    }

    async fn get_lobby(&self, lobby_id: LobbyId) -> Result<Option<LobbyRecord>, DatabaseError> {
        let row = sqlx::query(
            "SELECT id, name, game_type, password_hash, created_at FROM lobbies WHERE id = ?",
        )
        .bind(lobby_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        row.map(|row| {
            Ok(LobbyRecord {
                id: parse_id(&row, "id")?,
                name: row.get("name"),
                game_type: row.get("game_type"),
                created_at: row.get("created_at"),
                password_hash: row.get("password_hash"),
            })
        })
        .transpose()
    }

    async fn search_lobbies(
        &self,
        name: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<LobbySummary>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT l.id, l.name, l.created_at, g.status,
                    l.password_hash IS NOT NULL AS has_password,
                    (SELECT COUNT(*) FROM players p WHERE p.lobby_id = l.id AND p.is_active = 1)
                        AS active_players
             FROM lobbies l
             LEFT JOIN games g ON g.lobby_id = l.id
             WHERE l.name LIKE ? ESCAPE '\\'
             ORDER BY l.created_at DESC, l.rowid DESC
             LIMIT ? OFFSET ?",
        )
        .bind(like_pattern(name))
        .bind(i64::from(page_size))
        .bind(page_offset(page, page_size) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        rows.iter()
            .map(|row| {
                let status: Option<String> = row.get("status");
                let active_players: i64 = row.get("active_players");
                let has_password: i64 = row.get("has_password");
                Ok(LobbySummary {
                    id: parse_id(row, "id")?,
                    name: row.get("name"),
                    created_at: row.get("created_at"),
                    active_players: to_u32(active_players, "active_players")?,
                    has_password: has_password != 0,
                    status: status
                        .map(|s| s.parse::<GameStatus>())
                        .transpose()
                        .map_err(DatabaseError::InvalidData)?
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn count_lobbies(&self, name: Option<&str>) -> Result<u64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lobbies WHERE name LIKE ? ESCAPE '\\'")
            .bind(like_pattern(name))
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::query)?;
        u64::try_from(count).map_err(|_| DatabaseError::InvalidData(format!("lobby count {count}")))
    }

    async fn join_lobby(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
        name: &str,
    ) -> Result<RosterPlayer, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;
        let lobby_exists = sqlx::query("SELECT 1 FROM lobbies WHERE id = ?")
            .bind(lobby_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::query)?
            .is_some();
        if !lobby_exists {
            return Err(DatabaseError::LobbyNotFound(lobby_id));
        }

        sqlx::query(
            "INSERT INTO users (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(user_id.to_string())
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;

        let player = match fetch_player(&mut tx, lobby_id, user_id).await? {
            Some(mut player) => {
                sqlx::query("UPDATE players SET is_active = 1, name = ? WHERE id = ?")
                    .bind(name)
                    .bind(player.id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(DatabaseError::query)?;
                player.is_active = true;
                player.name = name.to_string();
                player
            }
            None => {
                let next_order: i64 = sqlx::query_scalar(
                    "SELECT COALESCE(MAX(join_order), 0) + 1 FROM players WHERE lobby_id = ?",
                )
                .bind(lobby_id.to_string())
                .fetch_one(&mut *tx)
                .await
                .map_err(DatabaseError::query)?;
                let player = RosterPlayer {
                    id: PlayerId::new(),
                    user_id,
                    name: name.to_string(),
                    join_order: to_u32(next_order, "join_order")?,
                    is_active: true,
                };
                sqlx::query(
                    "INSERT INTO players (id, lobby_id, user_id, name, join_order, is_active)
                     VALUES (?, ?, ?, ?, ?, 1)",
                )
                .bind(player.id.to_string())
                .bind(lobby_id.to_string())
                .bind(user_id.to_string())
                .bind(&player.name)
                .bind(next_order)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::query)?;
                player
            }
        };

        tx.commit().await.map_err(DatabaseError::transaction)?;
        tracing::info!(%lobby_id, player_id = %player.id, join_order = player.join_order, "Player joined lobby");
        Ok(player)
    }

    async fn find_player(
        &self,
        lobby_id: LobbyId,
        user_id: UserId,
    ) -> Result<Option<RosterPlayer>, DatabaseError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::query)?;
        fetch_player(&mut conn, lobby_id, user_id).await
    }

    async fn roster(&self, lobby_id: LobbyId) -> Result<Roster, DatabaseError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::query)?;
        fetch_roster(&mut conn, lobby_id).await
    }

    async fn create_deck(&self, name: &str) -> Result<DeckRecord, DatabaseError> {
        let deck = DeckRecord {
            id: DeckId::new(),
            name: name.to_string(),
            card_count: 0,
        };
        sqlx::query("INSERT INTO decks (id, name) VALUES (?, ?)")
            .bind(deck.id.to_string())
            .bind(&deck.name)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::query)?;
        Ok(deck)
    }

    async fn add_cards(
        &self,
        deck_id: DeckId,
        cards: &[(CardCategory, String)],
    ) -> Result<Vec<EventCard>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;
        let inserted = insert_cards(&mut tx, deck_id, cards).await?;
        tx.commit().await.map_err(DatabaseError::transaction)?;
        Ok(inserted)
    }

    async fn cards_in_decks(&self, deck_ids: &[DeckId]) -> Result<Vec<EventCard>, DatabaseError> {
        if deck_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; deck_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, deck_id, category, text FROM cards WHERE deck_id IN ({placeholders}) ORDER BY rowid"
        );
        let mut query = sqlx::query(&sql);
        for deck_id in deck_ids {
            query = query.bind(deck_id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::query)?;

        rows.iter()
            .map(|row| {
                let category: String = row.get("category");
                Ok(EventCard {
                    id: parse_id(row, "id")?,
                    deck_id: parse_id(row, "deck_id")?,
                    category: category.parse().map_err(DatabaseError::InvalidData)?,
                    text: row.get("text"),
                })
            })
            .collect()
    }

    async fn load_game(&self, lobby_id: LobbyId) -> Result<Option<ChronologyGame>, DatabaseError> {
        // One read transaction so the pieces come from the same commit.
        let mut tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;
        let Some(row) = sqlx::query(
            "SELECT id, created_at, current_player_id, status, cards_to_win, winner_id
             FROM games WHERE lobby_id = ?",
        )
        .bind(lobby_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::query)?
        else {
            return Ok(None);
        };

        let game_id: String = row.get("id");
        let status: String = row.get("status");
        let cards_to_win: i64 = row.get("cards_to_win");

        let current_card = sqlx::query("SELECT card_id, text, year FROM current_cards WHERE game_id = ?")
            .bind(&game_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::query)?
            .map(|row| dated_card(&row))
            .transpose()?;

        let game = Game {
            id: game_id.parse()?,
            lobby_id,
            created_at: row.get("created_at"),
            current_player_id: parse_optional_id(&row, "current_player_id")?,
            status: status.parse().map_err(DatabaseError::InvalidData)?,
            cards_to_win: to_u32(cards_to_win, "cards_to_win")?,
            winner_id: parse_optional_id(&row, "winner_id")?,
            current_card,
        };

        let pile_rows = sqlx::query(
            "SELECT card_id, text, year, drawn FROM draw_pile WHERE game_id = ? ORDER BY seq",
        )
        .bind(&game_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;
        let entries = pile_rows
            .iter()
            .map(|row| {
                let card = dated_card(row)?;
                Ok(DrawPileEntry {
                    card_id: card.card_id,
                    text: card.text,
                    year: card.year,
                    drawn: row.get("drawn"),
                })
            })
            .collect::<Result<Vec<_>, DatabaseError>>()?;

        let timeline_rows = sqlx::query(
            "SELECT id, player_id, card_id, text, year, position, placed_at
             FROM timeline_entries WHERE game_id = ? ORDER BY player_id, position",
        )
        .bind(&game_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;
        let mut by_player: HashMap<PlayerId, Vec<TimelineEntry>> = HashMap::new();
        for row in &timeline_rows {
            let position: i64 = row.get("position");
            let entry = TimelineEntry {
                id: parse_id(row, "id")?,
                card: dated_card(row)?,
                position: usize::try_from(position)
                    .map_err(|_| DatabaseError::InvalidData(format!("position {position}")))?,
                placed_at: row.get::<DateTime<Utc>, _>("placed_at"),
            };
            by_player
                .entry(parse_id(row, "player_id")?)
                .or_default()
                .push(entry);
        }
        let timelines = by_player
            .into_iter()
            .map(|(player_id, entries)| (player_id, Timeline::from_entries(entries)))
            .collect();

        let roster = fetch_roster(&mut tx, lobby_id).await?;
        tx.commit().await.map_err(DatabaseError::transaction)?;

        Ok(Some(ChronologyGame::from_parts(
            game,
            DrawPile::from_entries(entries),
            roster,
            timelines,
        )))
    }

    async fn save_game(&self, game: &ChronologyGame) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;
        write_game(&mut tx, game).await?;
        tx.commit().await.map_err(DatabaseError::transaction)?;
        tracing::debug!(game_id = %game.id(), status = %game.status(), "Saved game");
        Ok(())
    }
}

async fn write_game(conn: &mut SqliteConnection, aggregate: &ChronologyGame) -> Result<(), DatabaseError> {
    let game = &aggregate.game;
    let game_id = game.id.to_string();

    for player in aggregate.roster.players() {
        sqlx::query("UPDATE players SET is_active = ? WHERE id = ? AND lobby_id = ?")
            .bind(player.is_active)
            .bind(player.id.to_string())
            .bind(game.lobby_id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::query)?;
    }

    sqlx::query(
        "INSERT INTO games (id, lobby_id, created_at, current_player_id, status, cards_to_win, winner_id)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             current_player_id = excluded.current_player_id,
             status = excluded.status,
             cards_to_win = excluded.cards_to_win,
             winner_id = excluded.winner_id",
    )
    .bind(&game_id)
    .bind(game.lobby_id.to_string())
    .bind(game.created_at)
    .bind(game.current_player_id.map(|id| id.to_string()))
    .bind(game.status.to_string())
    .bind(i64::from(game.cards_to_win))
    .bind(game.winner_id.map(|id| id.to_string()))
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::query)?;

    sqlx::query("DELETE FROM current_cards WHERE game_id = ?")
        .bind(&game_id)
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::query)?;
    if let Some(card) = &game.current_card {
        sqlx::query("INSERT INTO current_cards (game_id, card_id, text, year) VALUES (?, ?, ?, ?)")
            .bind(&game_id)
            .bind(card.card_id.to_string())
            .bind(&card.text)
            .bind(i64::from(card.year))
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::query)?;
    }

    for (seq, entry) in aggregate.draw_pile.entries().iter().enumerate() {
        sqlx::query(
            "INSERT INTO draw_pile (game_id, card_id, text, year, drawn, seq) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(game_id, card_id) DO UPDATE SET drawn = excluded.drawn",
        )
        .bind(&game_id)
        .bind(entry.card_id.to_string())
        .bind(&entry.text)
        .bind(i64::from(entry.year))
        .bind(entry.drawn)
        .bind(seq as i64)
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::query)?;
    }

    sqlx::query("DELETE FROM timeline_entries WHERE game_id = ?")
        .bind(&game_id)
        .execute(&mut *conn)
        .await
        .map_err(DatabaseError::query)?;
    for (player_id, timeline) in aggregate.timelines() {
        for entry in timeline.entries() {
            sqlx::query(
                "INSERT INTO timeline_entries (id, game_id, player_id, card_id, text, year, position, placed_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(entry.id.to_string())
            .bind(&game_id)
            .bind(player_id.to_string())
            .bind(entry.card.card_id.to_string())
            .bind(&entry.card.text)
            .bind(i64::from(entry.card.year))
            .bind(entry.position as i64)
            .bind(entry.placed_at)
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::query)?;
        }
    }
    Ok(())
}

async fn insert_cards(
    conn: &mut SqliteConnection,
    deck_id: DeckId,
    cards: &[(CardCategory, String)],
) -> Result<Vec<EventCard>, DatabaseError> {
    let mut inserted = Vec::with_capacity(cards.len());
    for (category, text) in cards {
        let card = EventCard {
            id: CardId::new(),
            deck_id,
            category: *category,
            text: text.clone(),
        };
        sqlx::query("INSERT INTO cards (id, deck_id, category, text) VALUES (?, ?, ?, ?)")
            .bind(card.id.to_string())
            .bind(deck_id.to_string())
            .bind(card.category.to_string())
            .bind(&card.text)
            .execute(&mut *conn)
            .await
            .map_err(DatabaseError::query)?;
        inserted.push(card);
    }
    Ok(inserted)
}

async fn fetch_player(
    conn: &mut SqliteConnection,
    lobby_id: LobbyId,
    user_id: UserId,
) -> Result<Option<RosterPlayer>, DatabaseError> {
    sqlx::query(
        "SELECT id, user_id, name, join_order, is_active FROM players
         WHERE lobby_id = ? AND user_id = ?",
    )
    .bind(lobby_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(DatabaseError::query)?
    .map(|row| roster_player(&row))
    .transpose()
}

async fn fetch_roster(conn: &mut SqliteConnection, lobby_id: LobbyId) -> Result<Roster, DatabaseError> {
    let rows = sqlx::query(
        "SELECT id, user_id, name, join_order, is_active FROM players
         WHERE lobby_id = ? ORDER BY join_order",
    )
    .bind(lobby_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(DatabaseError::query)?;
    let players = rows.iter().map(roster_player).collect::<Result<Vec<_>, _>>()?;
    Ok(Roster::new(players))
}

fn roster_player(row: &SqliteRow) -> Result<RosterPlayer, DatabaseError> {
    let join_order: i64 = row.get("join_order");
    Ok(RosterPlayer {
        id: parse_id(row, "id")?,
        user_id: parse_id(row, "user_id")?,
        name: row.get("name"),
        join_order: to_u32(join_order, "join_order")?,
        is_active: row.get("is_active"),
    })
}

fn dated_card(row: &SqliteRow) -> Result<DatedCard, DatabaseError> {
    let year: i64 = row.get("year");
    Ok(DatedCard {
        card_id: parse_id(row, "card_id")?,
        text: row.get("text"),
        year: u16::try_from(year).map_err(|_| DatabaseError::InvalidData(format!("year {year}")))?,
    })
}

fn parse_id<T: FromStr<Err = uuid::Error>>(row: &SqliteRow, column: &str) -> Result<T, DatabaseError> {
    let text: String = row.get(column);
    Ok(text.parse::<T>()?)
}

fn parse_optional_id<T: FromStr<Err = uuid::Error>>(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<T>, DatabaseError> {
    let text: Option<String> = row.get(column);
    Ok(text.map(|text| text.parse::<T>()).transpose()?)
}

fn to_u32(value: i64, what: &str) -> Result<u32, DatabaseError> {
    u32::try_from(value).map_err(|_| DatabaseError::InvalidData(format!("{what} {value}")))
}

fn like_pattern(name: Option<&str>) -> String {
    let escaped = name
        .unwrap_or_default()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
