use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use clap::Args;
use database::DatabaseConfig;
use serde::Deserialize;
use thiserror::Error;
use types::DeckId;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Flags for `chronology-server serve`. Each one can also come from the
/// environment, and anything left unset falls back to the YAML file.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    #[arg(long, env = "CHRONOLOGY_HOST")]
    pub host: Option<IpAddr>,

    #[arg(short, long, env = "CHRONOLOGY_PORT")]
    pub port: Option<u16>,

    /// SQLite url or path; `sqlite::memory:` keeps everything in memory
    #[arg(long)]
    pub database_url: Option<String>,

    #[arg(short, long, env = "CHRONOLOGY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed for card draws, for reproducible games
    #[arg(long, env = "CHRONOLOGY_SEED")]
    pub seed: Option<u64>,

    #[arg(long)]
    pub cards_to_win: Option<u32>,
}

/// The optional YAML config file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub pool_size: Option<u32>,
    pub cards_to_win: Option<u32>,
    pub default_deck_id: Option<DeckId>,
    pub seed: Option<u64>,
    pub search_page_size: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database: DatabaseConfig,
    pub cards_to_win: u32,
    pub default_deck_id: DeckId,
    pub seed: Option<u64>,
    pub search_page_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            database: DatabaseConfig::default(),
            cards_to_win: types::DEFAULT_CARDS_TO_WIN,
            default_deck_id: database::default_deck_id(),
            seed: None,
            search_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ServerConfig {
    /// Reads the config file named by `args`, if any, and resolves.
    pub fn load(args: &ServeArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    /// Flags and environment first, then the file, then defaults.
    pub fn resolve(args: &ServeArgs, file: FileConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut database =
            DatabaseConfig::from_cli_or_env_or_yaml(args.database_url.clone(), file.database_url);
        if let Some(pool_size) = file.pool_size {
            database.pool_size = pool_size;
        }

        let config = Self {
            host: args.host.or(file.host).unwrap_or(defaults.host),
            port: args.port.or(file.port).unwrap_or(defaults.port),
            database,
            cards_to_win: args
                .cards_to_win
                .or(file.cards_to_win)
                .unwrap_or(defaults.cards_to_win),
            default_deck_id: file.default_deck_id.unwrap_or(defaults.default_deck_id),
            seed: args.seed.or(file.seed),
            search_page_size: file.search_page_size.unwrap_or(defaults.search_page_size),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cards_to_win == 0 {
            return Err(ConfigError::Invalid("cards_to_win must be positive".to_string()));
        }
        if self.search_page_size == 0 {
            return Err(ConfigError::Invalid(
                "search_page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
