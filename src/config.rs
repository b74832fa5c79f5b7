use std::env;

/// Runtime configuration, built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "riserva.db".to_string(),
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env::var("RISERVA_DB").unwrap_or(defaults.database_path),
        }
    }
}
