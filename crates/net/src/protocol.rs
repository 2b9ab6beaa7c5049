//! Client-to-hub protocol messages
//!
//! All messages are JSON-serialized and length-prefixed on the wire.
//! Hub-to-client traffic is `watchsync_core::SyncEvent`, serialized the
//! same way.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Commands a client may send to the hub.
///
/// The caller's identity is its connection; no command carries a user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Create a room and join it as host
    CreateRoom {
        name: String,
        username: String,
        #[serde(default)]
        password: Option<String>,
    },

    /// Join an existing room
    JoinRoom {
        room_id: Uuid,
        username: String,
        #[serde(default)]
        password: Option<String>,
    },

    /// Resume playback at the given offset
    Play { position: Duration },

    /// Pause playback at the given offset
    Pause { position: Duration },

    /// Jump to the given offset
    Seek { position: Duration },

    /// Switch the room's movie (host only)
    ChangeMovie { movie_id: String },

    /// Chat message to the current room
    SendMessage { message: String },

    /// Request the public room listing
    ListRooms,

    /// Request the public view of one room
    GetRoom { room_id: Uuid },
}
