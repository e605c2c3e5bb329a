//! Service configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Path to the SQLite database file
    pub db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            db_path: "bysykkel.db".to_string(),
        }
    }
}

impl Config {
    /// Build a config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("BYSYKKEL_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            db_path: std::env::var("BYSYKKEL_DB").unwrap_or(defaults.db_path),
        }
    }
}
