//! User model - one record per live connection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A participant in a room, keyed by its transport connection id.
///
/// Users live exactly as long as their room membership: created on join,
/// dropped on leave or disconnect, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque identity assigned by the transport, unique per live connection
    pub connection_id: Uuid,
    /// Display name, not unique
    pub username: String,
    /// Room this user currently belongs to, if any
    pub room_id: Option<Uuid>,
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
}

impl User {
    pub fn new(connection_id: Uuid, username: String) -> Self {
        Self {
            connection_id,
            username,
            room_id: None,
            is_host: false,
            joined_at: Utc::now(),
        }
    }
}
