//! Room model - membership and playback state for one watch party

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::User;

/// A watch-party room.
///
/// `users` is kept in join order; host succession always picks the first
/// remaining entry, so the order is meaningful and never re-sorted.
///
/// `current_position` and `is_playing` only carry meaning while
/// `current_movie_id` is set; a movie change resets both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    /// Shared-secret password; `None` or empty means the room is open
    pub password: Option<String>,
    pub users: Vec<User>,
    pub current_movie_id: Option<String>,
    pub current_position: Duration,
    pub is_playing: bool,
    /// Connection id of the single user with `is_host = true`,
    /// `None` while the room has no users
    pub host_connection_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Redacted room listing entry. The raw password never leaves the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    pub has_password: bool,
    pub user_count: usize,
    pub created_at: DateTime<Utc>,
    pub current_movie_id: Option<String>,
    pub is_playing: bool,
}

/// Redacted full room view, sent to joiners and public-view queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: Uuid,
    pub name: String,
    pub has_password: bool,
    pub current_movie_id: Option<String>,
    pub current_position: Duration,
    pub is_playing: bool,
    pub users: Vec<User>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(name: String, password: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            password,
            users: Vec::new(),
            current_movie_id: None,
            current_position: Duration::ZERO,
            is_playing: false,
            host_connection_id: None,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn has_password(&self) -> bool {
        matches!(self.password.as_deref(), Some(p) if !p.is_empty())
    }

    /// Exact-match check; rooms without a password accept anything.
    pub fn password_matches(&self, supplied: Option<&str>) -> bool {
        match self.password.as_deref() {
            None | Some("") => true,
            Some(expected) => supplied == Some(expected),
        }
    }

    pub fn member(&self, connection_id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.connection_id == connection_id)
    }

    pub fn is_member(&self, connection_id: Uuid) -> bool {
        self.member(connection_id).is_some()
    }

    pub fn is_host(&self, connection_id: Uuid) -> bool {
        self.host_connection_id == Some(connection_id)
    }

    /// Append a user; the first joiner becomes host.
    ///
    /// Returns the user as stored (with `room_id`/`is_host` filled in).
    pub fn add_user(&mut self, mut user: User) -> User {
        user.room_id = Some(self.id);
        user.is_host = self.users.is_empty();
        if user.is_host {
            self.host_connection_id = Some(user.connection_id);
        }
        self.users.push(user.clone());
        user
    }

    /// Remove a user by connection id.
    ///
    /// If the departing user was host and members remain, the first
    /// remaining user (join order) becomes host. Returns the removed user
    /// and the new host's connection id when one was promoted.
    pub fn remove_user(&mut self, connection_id: Uuid) -> Option<(User, Option<Uuid>)> {
        let idx = self
            .users
            .iter()
            .position(|u| u.connection_id == connection_id)?;
        let removed = self.users.remove(idx);

        let mut new_host = None;
        if self.users.is_empty() {
            self.host_connection_id = None;
        } else if removed.is_host {
            let next = &mut self.users[0];
            next.is_host = true;
            self.host_connection_id = Some(next.connection_id);
            new_host = Some(next.connection_id);
        }
        Some((removed, new_host))
    }

    // Playback transitions. All are last-writer-wins; the registry's
    // per-room lock is the only ordering between callers.

    pub fn apply_play(&mut self, position: Duration) {
        self.current_position = position;
        self.is_playing = true;
        self.last_updated = Utc::now();
    }

    pub fn apply_pause(&mut self, position: Duration) {
        self.current_position = position;
        self.is_playing = false;
        self.last_updated = Utc::now();
    }

    pub fn apply_seek(&mut self, position: Duration) {
        self.current_position = position;
        self.last_updated = Utc::now();
    }

    pub fn apply_movie_change(&mut self, movie_id: String) {
        self.current_movie_id = Some(movie_id);
        self.current_position = Duration::ZERO;
        self.is_playing = false;
        self.last_updated = Utc::now();
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            name: self.name.clone(),
            has_password: self.has_password(),
            user_count: self.users.len(),
            created_at: self.created_at,
            current_movie_id: self.current_movie_id.clone(),
            is_playing: self.is_playing,
        }
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            name: self.name.clone(),
            has_password: self.has_password(),
            current_movie_id: self.current_movie_id.clone(),
            current_position: self.current_position,
            is_playing: self.is_playing,
            users: self.users.clone(),
            created_at: self.created_at,
        }
    }
}
