//! Session registry - owns all rooms and the connection index
//!
//! The registry is the single source of truth for rooms, membership, and
//! playback state. Each room sits behind its own `RwLock`, so mutations on
//! different rooms proceed in parallel; the outer maps are only write-locked
//! by membership operations (join/leave/create), never by playback.
//!
//! Lock order is always maps -> room. Nothing here performs network I/O;
//! the engine queues broadcasts on its gateway, which never blocks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invariants::{assert_connection_id_valid, assert_room_invariants};
use crate::models::{Room, RoomSnapshot, RoomSummary, User};

type RoomMap = HashMap<Uuid, Arc<RwLock<Room>>>;

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub room_id: Uuid,
    /// The user as stored in the room
    pub user: User,
    /// Room state at the moment of joining
    pub room: RoomSnapshot,
    /// Set when the connection was moved out of a previous room
    pub prior: Option<LeaveOutcome>,
    /// Current playback state, present when a movie is set
    pub playback: Option<PlaybackState>,
    /// True when the connection was already a member of this room
    pub rejoined: bool,
}

/// Result of a leave (explicit or via disconnect)
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub room_id: Uuid,
    pub user: User,
    /// Connection promoted to host, when the departing user was host
    pub new_host: Option<Uuid>,
    /// True when the room became empty and was deleted
    pub room_removed: bool,
}

/// Playback state handed to late joiners
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub movie_id: String,
    pub position: Duration,
    pub is_playing: bool,
}

/// Central registry for all active rooms
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Room id -> room, each behind its own lock
    rooms: RwLock<RoomMap>,
    /// Connection id -> room id; a connection is in at most one room
    connections: RwLock<HashMap<Uuid, Uuid>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new empty room. Never fails.
    pub async fn create_room(&self, name: String, password: Option<String>) -> Uuid {
        let room = Room::new(name, password);
        let room_id = room.id;

        let mut rooms = self.rooms.write().await;
        rooms.insert(room_id, Arc::new(RwLock::new(room)));

        info!(room_id = %room_id, "Room created");
        room_id
    }

    /// Look up a room by id
    pub async fn room(&self, room_id: Uuid) -> Option<Arc<RwLock<Room>>> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    /// Find the room a connection currently belongs to
    pub async fn room_of_connection(&self, connection_id: Uuid) -> Option<(Uuid, Arc<RwLock<Room>>)> {
        let room_id = *self.connections.read().await.get(&connection_id)?;
        let room = self.rooms.read().await.get(&room_id).cloned()?;
        Some((room_id, room))
    }

    /// Current user record for a connection, if it is in a room
    pub async fn user_by_connection(&self, connection_id: Uuid) -> Option<User> {
        let (_, room) = self.room_of_connection(connection_id).await?;
        let room = room.read().await;
        room.member(connection_id).cloned()
    }

    /// Run a read-only closure against the caller's room.
    ///
    /// Fails `NotInRoom` when the connection has no membership (including
    /// the window where a leave raced this call).
    pub async fn with_room_of<T>(
        &self,
        connection_id: Uuid,
        f: impl FnOnce(&Room) -> T,
    ) -> Result<(Uuid, T)> {
        let (room_id, room) = self
            .room_of_connection(connection_id)
            .await
            .ok_or(Error::NotInRoom)?;
        let room = room.read().await;
        if !room.is_member(connection_id) {
            return Err(Error::NotInRoom);
        }
        Ok((room_id, f(&room)))
    }

    /// Run a mutating closure against the caller's room under its write
    /// lock. The closure must not block or perform I/O; queueing events on
    /// the gateway is fine (sends never block), and doing it here is what
    /// keeps per-room broadcast order equal to commit order.
    pub async fn update_room_of<T>(
        &self,
        connection_id: Uuid,
        f: impl FnOnce(&mut Room) -> T,
    ) -> Result<(Uuid, T)> {
        let (room_id, room) = self
            .room_of_connection(connection_id)
            .await
            .ok_or(Error::NotInRoom)?;
        let mut room = room.write().await;
        if !room.is_member(connection_id) {
            return Err(Error::NotInRoom);
        }
        let out = f(&mut room);
        assert_room_invariants(&room);
        Ok((room_id, out))
    }

    /// Join a room.
    ///
    /// Validates existence and password before any mutation, so a failed
    /// join leaves everything (including a prior membership) untouched.
    /// A connection already in a different room is moved: the prior leave
    /// runs first and its outcome is reported so the caller can emit the
    /// departure events.
    pub async fn join(
        &self,
        room_id: Uuid,
        connection_id: Uuid,
        username: String,
        password: Option<&str>,
    ) -> Result<JoinOutcome> {
        assert_connection_id_valid(connection_id, "join");
        let mut rooms = self.rooms.write().await;
        let mut connections = self.connections.write().await;

        let room_arc = rooms.get(&room_id).cloned().ok_or(Error::RoomNotFound)?;

        {
            let room = room_arc.read().await;
            if !room.password_matches(password) {
                return Err(Error::InvalidPassword);
            }
        }

        // Rejoin of the current room refreshes the username in place,
        // keeping join order and host flag
        if connections.get(&connection_id) == Some(&room_id) {
            let mut room = room_arc.write().await;
            let user = match room
                .users
                .iter_mut()
                .find(|u| u.connection_id == connection_id)
            {
                Some(user) => {
                    user.username = username;
                    user.clone()
                }
                None => {
                    return Err(Error::Internal(
                        "connection index points at a room without the user".to_string(),
                    ))
                }
            };
            let snapshot = room.snapshot();
            let playback = playback_state(&room);
            debug!(room_id = %room_id, connection_id = %connection_id, "Rejoined room");
            return Ok(JoinOutcome {
                room_id,
                user,
                room: snapshot,
                prior: None,
                playback,
                rejoined: true,
            });
        }

        // One room per connection: leave the prior room first
        let prior = match connections.get(&connection_id).copied() {
            Some(prior_room_id) => {
                leave_locked(&mut rooms, &mut connections, connection_id, prior_room_id).await
            }
            None => None,
        };

        let mut room = room_arc.write().await;
        let user = room.add_user(User::new(connection_id, username));
        connections.insert(connection_id, room_id);
        assert_room_invariants(&room);

        let snapshot = room.snapshot();
        let playback = playback_state(&room);

        info!(
            room_id = %room_id,
            connection_id = %connection_id,
            username = %user.username,
            is_host = user.is_host,
            members = room.users.len(),
            "User joined room"
        );

        Ok(JoinOutcome {
            room_id,
            user,
            room: snapshot,
            prior,
            playback,
            rejoined: false,
        })
    }

    /// Remove a connection from its room, if any. Idempotent: unknown
    /// connections are a no-op, so an explicit leave racing a disconnect
    /// is safe. Empty rooms are deleted here, at the end of the leave that
    /// emptied them.
    pub async fn leave(&self, connection_id: Uuid) -> Option<LeaveOutcome> {
        let mut rooms = self.rooms.write().await;
        let mut connections = self.connections.write().await;

        let room_id = connections.get(&connection_id).copied()?;
        leave_locked(&mut rooms, &mut connections, connection_id, room_id).await
    }

    /// Rooms with at least one user, newest first
    pub async fn active_rooms(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.read().await;
        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms.values() {
            let room = room.read().await;
            if !room.users.is_empty() {
                summaries.push(room.summary());
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Redacted view of a single room
    pub async fn public_view(&self, room_id: Uuid) -> Option<RoomSnapshot> {
        let room = self.room(room_id).await?;
        let room = room.read().await;
        Some(room.snapshot())
    }

    /// Total number of rooms (including not-yet-joined ones)
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Number of connections currently in a room
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

fn playback_state(room: &Room) -> Option<PlaybackState> {
    room.current_movie_id.clone().map(|movie_id| PlaybackState {
        movie_id,
        position: room.current_position,
        is_playing: room.is_playing,
    })
}

/// Leave implementation shared by `leave` and the join-moves-room path.
/// Callers hold both outer map write locks.
async fn leave_locked(
    rooms: &mut RoomMap,
    connections: &mut HashMap<Uuid, Uuid>,
    connection_id: Uuid,
    room_id: Uuid,
) -> Option<LeaveOutcome> {
    connections.remove(&connection_id);

    let room_arc = rooms.get(&room_id).cloned()?;
    let mut room = room_arc.write().await;
    let (user, new_host) = room.remove_user(connection_id)?;
    let room_removed = room.users.is_empty();

    if room_removed {
        rooms.remove(&room_id);
        info!(room_id = %room_id, "Room removed (last user left)");
    } else {
        info!(
            room_id = %room_id,
            connection_id = %connection_id,
            new_host = ?new_host,
            members = room.users.len(),
            "User left room"
        );
    }
    assert_room_invariants(&room);

    Some(LeaveOutcome {
        room_id,
        user,
        new_host,
        room_removed,
    })
}
