//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and from `SPLITLEDGER__*` environment variables
//! (for example `SPLITLEDGER__APP__LEVEL=debug`).
//!
//! See `settings.example.toml` for the configuration.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_SQLITE_PATH: &str = "./splitledger.db";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where the ledger lives.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Database::Sqlite(DEFAULT_SQLITE_PATH.to_string())
    }
}

impl Database {
    /// Connection string for the durable store, `None` for a volatile one.
    pub fn url(&self) -> Option<String> {
        match self {
            Database::Memory => None,
            Database::Sqlite(path) => Some(format!("sqlite:{path}?mode=rwc")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("settings")
    }

    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(name).required(false))
            .add_source(
                Environment::with_prefix("SPLITLEDGER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults_to_a_local_sqlite_file() {
        let settings = parse("");
        assert_eq!(settings.app.level, "info");
        assert_eq!(
            settings.database.url().as_deref(),
            Some("sqlite:./splitledger.db?mode=rwc")
        );
    }

    #[test]
    fn reads_both_database_kinds() {
        let settings = parse("database = \"memory\"\n[app]\nlevel = \"debug\"\n");
        assert_eq!(settings.database, Database::Memory);
        assert_eq!(settings.database.url(), None);
        assert_eq!(settings.app.level, "debug");

        let settings = parse("[database]\nsqlite = \"/var/lib/ledger.db\"\n");
        assert_eq!(
            settings.database,
            Database::Sqlite("/var/lib/ledger.db".to_string())
        );
    }
}
