use std::str::FromStr;

use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_pool_size() -> u32 {
    20
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: IN_MEMORY_URL.to_string(),
            pool_size: default_pool_size(),
        }
    }
}

impl DatabaseConfig {
    pub fn from_cli_or_env_or_yaml(cli_arg: Option<String>, yaml_config: Option<String>) -> Self {
        let url = if let Some(arg) = cli_arg {
            arg
        } else if let Ok(env) = std::env::var("DATABASE_URL") {
            env
        } else if let Some(yaml) = yaml_config {
            yaml
        } else {
            IN_MEMORY_URL.to_string()
        };

        Self {
            url,
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url == IN_MEMORY_URL || self.url == ":memory:"
    }

    pub async fn create_pool(&self) -> Result<SqlitePool, sqlx::Error> {
        // An in-memory database lives only as long as a connection to it.
        let (options, pool_options) = if self.is_in_memory() {
            (
                SqliteConnectOptions::from_str(IN_MEMORY_URL)?,
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None),
            )
        } else {
            let path = self.url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            (
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true),
                SqlitePoolOptions::new().max_connections(self.pool_size.max(1)),
            )
        };

        pool_options.connect_with(options.foreign_keys(true)).await
    }
}
