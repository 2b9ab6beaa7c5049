//! Server configuration
//!
//! Loaded from a TOML file: listen port plus the movie catalog the hub
//! serves. Missing file means defaults (port only, empty catalog).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use watchsync_core::Movie;
use watchsync_net::DEFAULT_PORT;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// TCP port the hub listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Movies available to rooms
    #[serde(default)]
    pub movies: Vec<MovieEntry>,
}

/// One catalog entry in the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovieEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_url: String,
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            movies: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }
}

impl MovieEntry {
    /// Build the catalog movie for this entry
    pub fn into_movie(self) -> Movie {
        let mut movie = Movie::new(self.id, self.title, self.video_url);
        if let Some(description) = self.description {
            movie = movie.with_description(description);
        }
        if let Some(secs) = self.duration_secs {
            movie = movie.with_duration(Duration::from_secs(secs));
        }
        movie
    }
}
