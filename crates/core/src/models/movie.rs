//! Movie metadata as resolved by the catalog

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a playable video asset.
///
/// The engine never touches the asset itself; it only relays this record
/// to clients so their players can load `video_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub video_url: String,
    /// Duration hint, absent when the catalog does not know it
    #[serde(default)]
    pub duration: Option<Duration>,
    pub created_at: DateTime<Utc>,
}

impl Movie {
    pub fn new(id: String, title: String, video_url: String) -> Self {
        Self {
            id,
            title,
            description: None,
            video_url,
            duration: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}
