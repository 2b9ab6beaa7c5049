//! Outbound event vocabulary
//!
//! Everything the engine can say to a client. The transport serializes
//! these as tagged JSON and delivers them verbatim; the engine decides the
//! addressing (caller, whole room, room minus the actor).
//!
//! Presence events (`UserJoined`/`UserLeft`) exclude the actor; playback
//! and movie events include it, because clients reconcile their player to
//! the authoritative echo.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::models::{Movie, RoomSnapshot, RoomSummary, User};

/// Events emitted by the engine toward clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    /// Sent to the creator after a successful room creation
    RoomCreated { room: RoomSnapshot },

    /// Sent to a joiner alone: the room as it stands
    RoomJoined { room: RoomSnapshot },

    /// A new member arrived (sent to everyone else in the room)
    UserJoined { user: User },

    /// A member left or disconnected (sent to the remaining members)
    UserLeft { user: User },

    /// Host migrated after the previous host left
    HostChanged { host_connection_id: Uuid },

    /// Playback resumed at the given offset
    Play { position: Duration },

    /// Playback paused at the given offset
    Pause { position: Duration },

    /// Position changed without touching the play/pause state
    Seek { position: Duration },

    /// The room's movie changed; position resets to zero, paused
    MovieChanged { movie: Movie },

    /// Current playback state, sent to late joiners when a movie is set
    SyncState { position: Duration, is_playing: bool },

    /// Chat relay, not part of playback state
    MessageReceived {
        username: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Answer to a room listing query
    RoomList { rooms: Vec<RoomSummary> },

    /// Answer to a single-room query
    RoomView { room: RoomSnapshot },

    /// Operation failed; always unicast to the invoking connection only
    Error { kind: ErrorKind, message: String },
}

impl SyncEvent {
    pub fn error(err: &crate::error::Error) -> Self {
        SyncEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
