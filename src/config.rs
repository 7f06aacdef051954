//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/graphbridge/config.toml` (XDG) or platform config dir
//! 2. Project config: `.graphbridge.toml`
//! 3. Document store environment variables: `MONGO_*`
//! 4. Environment variables: `GRAPHBRIDGE_*` (`__` separates nested keys)
//!
//! The graph connection itself is NOT configured here: it lives in the
//! `graphDbConnection` collection of the document store and is read by the
//! [`ConnectionManager`](crate::connection::ConnectionManager).
//!
//! # Example
//!
//! ```toml
//! [mongo]
//! address = "mongo.internal"
//! port = 27017
//! database = "galileo"
//!
//! [datasource]
//! fetch_size = 500
//! default_graph_fallback = "neo4j"
//! ```
//!
//! Credentials are usually supplied through `MONGO_USERNAME` and
//! `MONGO_PASSWORD`.

use std::ops::Deref;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::error::AppError;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mongo: MongoConfig,
    #[serde(default)]
    pub datasource: DataSourceOptions,
}

pub const DEFAULT_MONGO_ADDRESS: &str = "localhost";
pub const DEFAULT_MONGO_PORT: u16 = 27017;
pub const DEFAULT_MONGO_DATABASE: &str = "galileo";

/// Document store (MongoDB) connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    #[serde(default = "default_mongo_address")]
    pub address: String,
    #[serde(default = "default_mongo_port")]
    pub port: u16,
    #[serde(default = "default_mongo_database")]
    pub database: String,
    /// Required. Kept optional here so a missing value surfaces as a
    /// configuration error naming the environment variable.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            address: default_mongo_address(),
            port: default_mongo_port(),
            database: default_mongo_database(),
            username: None,
            password: None,
        }
    }
}

fn default_mongo_address() -> String {
    DEFAULT_MONGO_ADDRESS.to_string()
}

fn default_mongo_port() -> u16 {
    DEFAULT_MONGO_PORT
}

fn default_mongo_database() -> String {
    DEFAULT_MONGO_DATABASE.to_string()
}

impl MongoConfig {
    /// Returns `(username, password)`, failing when either is missing or blank.
    pub fn credentials(&self) -> Result<(&str, &str), AppError> {
        let username = non_blank(self.username.as_deref()).ok_or_else(|| {
            AppError::Configuration("value of 'MONGO_USERNAME' must be set".into())
        })?;
        let password = non_blank(self.password.as_deref()).ok_or_else(|| {
            AppError::Configuration("value of 'MONGO_PASSWORD' must be set".into())
        })?;
        Ok((username, password))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Tuning knobs for the graph data sources built by the connection manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSourceOptions {
    /// Neo4j records fetched per round-trip.
    pub fetch_size: usize,
    /// Neo4j connection pool size.
    pub max_connections: usize,
    /// Gremlin connection pool size.
    pub gremlin_pool_size: u32,
    /// Database name used when the server cannot report its default
    /// database. `None` propagates the lookup error instead.
    pub default_graph_fallback: Option<String>,
}

pub const DEFAULT_GRAPH_NAME: &str = "neo4j";

impl Default for DataSourceOptions {
    fn default() -> Self {
        Self {
            fetch_size: 1000,
            max_connections: 16,
            gremlin_pool_size: 4,
            default_graph_fallback: Some(DEFAULT_GRAPH_NAME.to_string()),
        }
    }
}

impl Config {
    /// Load config with layered resolution (user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment().extract().map_err(ConfigError::from)
    }

    /// The layered figment, exposed so callers can add their own providers.
    pub fn figment() -> Figment {
        Figment::new()
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(Self::user_config_path()))
            // Layer 2: Project config
            .merge(Toml::file(".graphbridge.toml"))
            // Layer 3: MONGO_ADDRESS, MONGO_PORT, MONGO_USERNAME, ...
            .merge(Env::prefixed("MONGO_").map(|key| format!("mongo.{}", key).into()))
            // Layer 4: Environment variables (highest priority)
            .merge(Env::prefixed("GRAPHBRIDGE_").split("__"))
    }

    /// User config path: ~/.config/graphbridge/config.toml (XDG) or platform config dir.
    fn user_config_path() -> std::path::PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("graphbridge").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        // Fall back to platform-specific config dir
        dirs::config_dir()
            .map(|p| p.join("graphbridge").join("config.toml"))
            .unwrap_or_default()
    }
}
