use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use database::{
    retry::RetryFuture, retry_with_backoff, DatabaseConfig, DatabaseError, GameStore, SqliteStore,
};
use server::{
    router, AppState, ChronologyEngine, EngineSettings, NoopNotifier, ServeArgs, ServerConfig,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONNECT_RETRIES: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "chronology-server", about = "Chronology timeline party game server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default)
    Serve(ServeArgs),
    /// Load a text file as a new deck, one card per non-empty line
    ImportDeck {
        #[arg(long)]
        name: String,
        file: PathBuf,
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        None => serve(&cli.serve).await,
        Some(Command::Serve(args)) => serve(&args).await,
        Some(Command::ImportDeck {
            name,
            file,
            database_url,
        }) => import_deck(&name, &file, database_url).await,
    }
}

async fn connect(config: &DatabaseConfig) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    let store = retry_with_backoff(
        || -> RetryFuture<SqliteStore, DatabaseError> {
            let config = config.clone();
            Box::pin(async move { SqliteStore::connect(&config).await })
        },
        CONNECT_RETRIES,
        Duration::from_millis(200),
    )
    .await?;
    Ok(store)
}

async fn serve(args: &ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load(args)?;
    if config.database.is_in_memory() {
        tracing::warn!("Using an in-memory database, nothing will survive a restart");
    }
    let store: Arc<dyn GameStore> = Arc::new(connect(&config.database).await?);
    let settings = EngineSettings {
        default_cards_to_win: config.cards_to_win,
        default_deck_id: config.default_deck_id,
        rng_seed: config.seed,
        ..EngineSettings::default()
    };
    let app = router(AppState::new(store, settings, config.search_page_size));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Chronology server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn import_deck(
    name: &str,
    file: &Path,
    database_url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(file)?;
    let config = DatabaseConfig::from_cli_or_env_or_yaml(database_url, None);
    let store: Arc<dyn GameStore> = Arc::new(connect(&config).await?);
    let engine = ChronologyEngine::new(store, Arc::new(NoopNotifier), EngineSettings::default());

    let summary = engine.import_deck(name, &text).await?;
    println!(
        "Imported deck {:?} ({}): {} cards, {} with a year",
        summary.deck.name, summary.deck.id, summary.cards, summary.dated
    );
    Ok(())
}
