use std::sync::Arc;

use clap::Parser;
use database::{DatabaseConfig, GameStore, MemoryStore, SqliteStore};
use server::{run_game, setup_lobby, ChronologyEngine, EngineSettings, NoopNotifier, Seat};
use strategies::{DefaultStrategy, FallibleStrategy, InputStrategy, RandomStrategy};
use types::PlacementStrategy;

#[derive(Parser, Debug)]
struct Params {
    /// `name` or `name:strategy`, where strategy is one of
    /// default, random, fallible or input
    #[arg(short, long)]
    player: Vec<String>,

    #[arg(short, long, default_value_t = 1)]
    games: usize,

    #[arg(long, default_value_t = types::DEFAULT_CARDS_TO_WIN)]
    cards_to_win: u32,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    delay_ms: Option<u64>,

    /// Record games in this SQLite database instead of memory
    #[arg(long)]
    database_url: Option<String>,
}

fn make_strategy(kind: &str, seed: u64) -> Result<Box<dyn PlacementStrategy>, String> {
    match kind {
        "default" => Ok(Box::new(DefaultStrategy::default())),
        "random" => Ok(Box::new(RandomStrategy::seeded(seed))),
        "fallible" => Ok(Box::new(FallibleStrategy::new(0.7, seed))),
        "input" => Ok(Box::new(InputStrategy::default())),
        other => Err(format!("unknown strategy: {other}")),
    }
}

fn make_seats(players: &[String], seed: u64) -> Result<Vec<Seat>, String> {
    players
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            let (name, kind) = arg.split_once(':').unwrap_or((arg.as_str(), "default"));
            Ok(Seat::new(name, make_strategy(kind, seed.wrapping_add(i as u64))?))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Params::parse();
    log::info!("args: {args:?}");
    if args.player.is_empty() {
        return Err("at least one --player is required".into());
    }

    let store: Arc<dyn GameStore> = match &args.database_url {
        Some(url) => {
            let config = DatabaseConfig::from_cli_or_env_or_yaml(Some(url.clone()), None);
            Arc::new(SqliteStore::connect(&config).await?)
        }
        None => Arc::new(MemoryStore::new()),
    };
    let settings = EngineSettings {
        rng_seed: args.seed,
        ..EngineSettings::default()
    };
    let engine = ChronologyEngine::new(store, Arc::new(NoopNotifier), settings);
    let mut seats = make_seats(&args.player, args.seed.unwrap_or_default())?;

    for game in 1..=args.games {
        let lobby_id = setup_lobby(
            &engine,
            &format!("Simulation {game}"),
            args.cards_to_win,
            &seats,
        )
        .await?;
        let outcome = run_game(&engine, lobby_id, &mut seats, args.delay_ms).await?;
        log::info!(
            "Game {game}: {} after {} turns ({} correct)",
            outcome.winner.as_deref().unwrap_or("no winner"),
            outcome.turns,
            outcome.correct
        );
    }
    Ok(())
}
