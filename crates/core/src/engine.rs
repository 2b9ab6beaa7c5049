//! Synchronization engine - the operation surface the transport drives
//!
//! One method per inbound client message. Every operation follows the same
//! shape: resolve the caller's room, validate, then mutate through the
//! registry and queue the broadcast under the same room lock, so per-room
//! events always leave in commit order. Gateway sends are non-blocking
//! queue pushes, never network I/O, so nothing blocks under the lock. A
//! failed operation mutates nothing and unicasts a single `Error` event to
//! the invoking connection; nothing else is sent.
//!
//! Broadcast addressing is deliberate and asymmetric: presence events
//! (`UserJoined`/`UserLeft`) go to everyone *except* the actor, while
//! playback and movie events go to everyone *including* the actor, whose
//! player reconciles to the authoritative echo. Play/pause/seek are open to
//! any member; only movie selection is host-gated.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::MovieCatalog;
use crate::error::{Error, Result};
use crate::events::SyncEvent;
use crate::gateway::BroadcastGateway;
use crate::models::{RoomSnapshot, RoomSummary};
use crate::registry::{LeaveOutcome, SessionRegistry};

pub struct SyncEngine {
    registry: SessionRegistry,
    catalog: Arc<dyn MovieCatalog>,
    gateway: Arc<dyn BroadcastGateway>,
}

impl SyncEngine {
    pub fn new(catalog: Arc<dyn MovieCatalog>, gateway: Arc<dyn BroadcastGateway>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            catalog,
            gateway,
        }
    }

    /// Create a room and join the creator as its host.
    pub async fn create_room(
        &self,
        connection_id: Uuid,
        name: String,
        username: String,
        password: Option<String>,
    ) -> Result<RoomSnapshot> {
        let result = self
            .try_create_room(connection_id, name, username, password)
            .await;
        self.report(connection_id, result)
    }

    async fn try_create_room(
        &self,
        connection_id: Uuid,
        name: String,
        username: String,
        password: Option<String>,
    ) -> Result<RoomSnapshot> {
        let room_id = self.registry.create_room(name, password.clone()).await;
        let outcome = self
            .registry
            .join(room_id, connection_id, username, password.as_deref())
            .await?;

        if let Some(prior) = &outcome.prior {
            self.emit_departure(prior);
        }
        self.gateway.add_to_group(room_id, connection_id);
        self.gateway.send_to_caller(
            connection_id,
            SyncEvent::RoomCreated {
                room: outcome.room.clone(),
            },
        );
        Ok(outcome.room)
    }

    /// Join an existing room.
    pub async fn join_room(
        &self,
        connection_id: Uuid,
        room_id: Uuid,
        username: String,
        password: Option<String>,
    ) -> Result<()> {
        let result = self
            .try_join_room(connection_id, room_id, username, password)
            .await;
        self.report(connection_id, result)
    }

    async fn try_join_room(
        &self,
        connection_id: Uuid,
        room_id: Uuid,
        username: String,
        password: Option<String>,
    ) -> Result<()> {
        let outcome = self
            .registry
            .join(room_id, connection_id, username, password.as_deref())
            .await?;

        if let Some(prior) = &outcome.prior {
            self.emit_departure(prior);
        }
        if !outcome.rejoined {
            self.gateway.add_to_group(room_id, connection_id);
        }

        self.gateway
            .send_to_caller(connection_id, SyncEvent::RoomJoined { room: outcome.room });
        if !outcome.rejoined {
            self.gateway.send_to_room_except(
                room_id,
                connection_id,
                SyncEvent::UserJoined { user: outcome.user },
            );
        }

        // Late joiners get the current movie and position so their player
        // can catch up
        if let Some(playback) = outcome.playback {
            match self.catalog.resolve(&playback.movie_id) {
                Some(movie) => {
                    self.gateway
                        .send_to_caller(connection_id, SyncEvent::MovieChanged { movie });
                    self.gateway.send_to_caller(
                        connection_id,
                        SyncEvent::SyncState {
                            position: playback.position,
                            is_playing: playback.is_playing,
                        },
                    );
                }
                None => {
                    warn!(
                        room_id = %room_id,
                        movie_id = %playback.movie_id,
                        "Room references a movie the catalog no longer knows"
                    );
                }
            }
        }
        Ok(())
    }

    /// Resume playback at `position`. Any member may call this.
    pub async fn play(&self, connection_id: Uuid, position: Duration) -> Result<()> {
        let result = self.try_play(connection_id, position).await;
        self.report(connection_id, result)
    }

    async fn try_play(&self, connection_id: Uuid, position: Duration) -> Result<()> {
        let (room_id, _) = self
            .registry
            .update_room_of(connection_id, |room| {
                room.apply_play(position);
                self.gateway
                    .send_to_room(room.id, SyncEvent::Play { position });
            })
            .await?;
        debug!(room_id = %room_id, connection_id = %connection_id, position_ms = position.as_millis() as u64, "Play");
        Ok(())
    }

    /// Pause playback at `position`. Any member may call this.
    pub async fn pause(&self, connection_id: Uuid, position: Duration) -> Result<()> {
        let result = self.try_pause(connection_id, position).await;
        self.report(connection_id, result)
    }

    async fn try_pause(&self, connection_id: Uuid, position: Duration) -> Result<()> {
        let (room_id, _) = self
            .registry
            .update_room_of(connection_id, |room| {
                room.apply_pause(position);
                self.gateway
                    .send_to_room(room.id, SyncEvent::Pause { position });
            })
            .await?;
        debug!(room_id = %room_id, connection_id = %connection_id, position_ms = position.as_millis() as u64, "Pause");
        Ok(())
    }

    /// Jump to `position` without touching the play/pause state.
    pub async fn seek(&self, connection_id: Uuid, position: Duration) -> Result<()> {
        let result = self.try_seek(connection_id, position).await;
        self.report(connection_id, result)
    }

    async fn try_seek(&self, connection_id: Uuid, position: Duration) -> Result<()> {
        let (room_id, _) = self
            .registry
            .update_room_of(connection_id, |room| {
                room.apply_seek(position);
                self.gateway
                    .send_to_room(room.id, SyncEvent::Seek { position });
            })
            .await?;
        debug!(room_id = %room_id, connection_id = %connection_id, position_ms = position.as_millis() as u64, "Seek");
        Ok(())
    }

    /// Switch the room's movie. Host only.
    pub async fn change_movie(&self, connection_id: Uuid, movie_id: &str) -> Result<()> {
        let result = self.try_change_movie(connection_id, movie_id).await;
        self.report(connection_id, result)
    }

    async fn try_change_movie(&self, connection_id: Uuid, movie_id: &str) -> Result<()> {
        // Host check first, so a non-host with a bad movie id still gets
        // NotHost rather than MovieNotFound
        let (_, is_host) = self
            .registry
            .with_room_of(connection_id, |room| room.is_host(connection_id))
            .await?;
        if !is_host {
            return Err(Error::NotHost);
        }

        // Catalog resolution stays outside the room lock; membership and
        // host status are re-checked before the mutation
        let movie = self
            .catalog
            .resolve(movie_id)
            .ok_or_else(|| Error::MovieNotFound(movie_id.to_string()))?;

        let (room_id, applied) = self
            .registry
            .update_room_of(connection_id, |room| {
                if !room.is_host(connection_id) {
                    return false;
                }
                room.apply_movie_change(movie.id.clone());
                self.gateway.send_to_room(
                    room.id,
                    SyncEvent::MovieChanged {
                        movie: movie.clone(),
                    },
                );
                true
            })
            .await?;
        if !applied {
            return Err(Error::NotHost);
        }

        info!(room_id = %room_id, movie_id = %movie.id, "Movie changed");
        Ok(())
    }

    /// Relay a chat message to the caller's room.
    pub async fn send_message(&self, connection_id: Uuid, message: String) -> Result<()> {
        let result = self.try_send_message(connection_id, message).await;
        self.report(connection_id, result)
    }

    async fn try_send_message(&self, connection_id: Uuid, message: String) -> Result<()> {
        let (room_id, username) = self
            .registry
            .with_room_of(connection_id, |room| {
                room.member(connection_id).map(|u| u.username.clone())
            })
            .await?;
        let username = username.ok_or(Error::NotInRoom)?;
        self.gateway
            .send_chat(room_id, username, message, Utc::now());
        Ok(())
    }

    /// Implicit leave. Idempotent, and safe to race an explicit leave
    /// issued just before the disconnect.
    pub async fn disconnect(&self, connection_id: Uuid) {
        if let Some(outcome) = self.registry.leave(connection_id).await {
            self.emit_departure(&outcome);
        }
    }

    /// Rooms with members, newest first. Passwords are redacted.
    pub async fn list_active_rooms(&self) -> Vec<RoomSummary> {
        self.registry.active_rooms().await
    }

    /// Redacted view of one room.
    pub async fn room_public_view(&self, room_id: Uuid) -> Option<RoomSnapshot> {
        self.registry.public_view(room_id).await
    }

    /// Departure events for a committed leave: the actor is already out of
    /// the group, so `send_to_room` reaches only the remaining members.
    fn emit_departure(&self, outcome: &LeaveOutcome) {
        self.gateway
            .remove_from_group(outcome.room_id, outcome.user.connection_id);
        if outcome.room_removed {
            return;
        }
        self.gateway.send_to_room(
            outcome.room_id,
            SyncEvent::UserLeft {
                user: outcome.user.clone(),
            },
        );
        if let Some(host) = outcome.new_host {
            self.gateway.send_to_room(
                outcome.room_id,
                SyncEvent::HostChanged {
                    host_connection_id: host,
                },
            );
        }
    }

    /// Unicast the error back to the caller; the failed operation performed
    /// no mutation and nothing is broadcast.
    fn report<T>(&self, connection_id: Uuid, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            debug!(connection_id = %connection_id, error = %err, "Operation rejected");
            self.gateway
                .send_to_caller(connection_id, SyncEvent::error(err));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::error::ErrorKind;
    use crate::models::Movie;
    use std::sync::Mutex;

    /// Where a recorded event was addressed
    #[derive(Debug, Clone)]
    enum Delivery {
        Caller(Uuid, SyncEvent),
        Room(Uuid, SyncEvent),
        RoomExcept(Uuid, Uuid, SyncEvent),
    }

    /// Gateway double that records every send in order
    #[derive(Debug, Default)]
    struct RecordingGateway {
        log: Mutex<Vec<Delivery>>,
    }

    impl RecordingGateway {
        fn take(&self) -> Vec<Delivery> {
            std::mem::take(&mut self.log.lock().unwrap())
        }
    }

    impl BroadcastGateway for RecordingGateway {
        fn add_to_group(&self, _room_id: Uuid, _connection_id: Uuid) {}
        fn remove_from_group(&self, _room_id: Uuid, _connection_id: Uuid) {}

        fn send_to_caller(&self, connection_id: Uuid, event: SyncEvent) {
            self.log
                .lock()
                .unwrap()
                .push(Delivery::Caller(connection_id, event));
        }

        fn send_to_room(&self, room_id: Uuid, event: SyncEvent) {
            self.log.lock().unwrap().push(Delivery::Room(room_id, event));
        }

        fn send_to_room_except(&self, room_id: Uuid, except: Uuid, event: SyncEvent) {
            self.log
                .lock()
                .unwrap()
                .push(Delivery::RoomExcept(room_id, except, event));
        }
    }

    fn engine_with_movie() -> (SyncEngine, Arc<RecordingGateway>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.register(Movie::new(
            "m1".to_string(),
            "Big Buck Bunny".to_string(),
            "https://example.com/bbb.mp4".to_string(),
        ));
        let gateway = Arc::new(RecordingGateway::default());
        let engine = SyncEngine::new(catalog, gateway.clone());
        (engine, gateway)
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let (engine, gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        // Alice creates the room and is its host
        let room = engine
            .create_room(alice, "movie-night".to_string(), "alice".to_string(), None)
            .await
            .unwrap();
        assert_eq!(room.users.len(), 1);
        assert!(room.users[0].is_host);
        let log = gateway.take();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            Delivery::Caller(to, SyncEvent::RoomCreated { .. }) if *to == alice
        ));

        // Bob joins: snapshot to bob (no movie yet), presence to the others
        engine
            .join_room(bob, room.id, "bob".to_string(), None)
            .await
            .unwrap();
        let log = gateway.take();
        assert_eq!(log.len(), 2);
        match &log[0] {
            Delivery::Caller(to, SyncEvent::RoomJoined { room }) => {
                assert_eq!(*to, bob);
                assert!(room.current_movie_id.is_none());
                assert_eq!(room.users.len(), 2);
            }
            other => panic!("Expected RoomJoined to bob, got {:?}", other),
        }
        assert!(matches!(
            &log[1],
            Delivery::RoomExcept(r, e, SyncEvent::UserJoined { .. })
                if *r == room.id && *e == bob
        ));

        // Host changes the movie: everyone gets the echo
        engine.change_movie(alice, "m1").await.unwrap();
        let log = gateway.take();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            Delivery::Room(r, SyncEvent::MovieChanged { movie })
                if *r == room.id && movie.id == "m1"
        ));

        // Non-host play is allowed and echoes to the whole room
        engine.play(bob, Duration::ZERO).await.unwrap();
        let log = gateway.take();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            Delivery::Room(r, SyncEvent::Play { position })
                if *r == room.id && *position == Duration::ZERO
        ));
    }

    #[tokio::test]
    async fn test_playback_broadcast_ordering() {
        let (engine, gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let room = engine
            .create_room(alice, "movie-night".to_string(), "alice".to_string(), None)
            .await
            .unwrap();
        engine
            .join_room(bob, room.id, "bob".to_string(), None)
            .await
            .unwrap();
        gateway.take();

        engine.play(alice, Duration::ZERO).await.unwrap();
        engine.seek(bob, Duration::from_secs(50)).await.unwrap();
        engine.pause(bob, Duration::from_secs(50)).await.unwrap();

        // Exactly three broadcasts, in commit order
        let log = gateway.take();
        assert_eq!(log.len(), 3);
        assert!(matches!(&log[0], Delivery::Room(_, SyncEvent::Play { .. })));
        assert!(matches!(
            &log[1],
            Delivery::Room(_, SyncEvent::Seek { position }) if *position == Duration::from_secs(50)
        ));
        assert!(matches!(&log[2], Delivery::Room(_, SyncEvent::Pause { .. })));

        let view = engine.room_public_view(room.id).await.unwrap();
        assert_eq!(view.current_position, Duration::from_secs(50));
        assert!(!view.is_playing);
    }

    #[tokio::test]
    async fn test_racing_playback_broadcasts_match_commit_order() {
        // Two members fire conflicting transitions at the same room; the
        // last broadcast every client sees must agree with the committed
        // state, whichever order the commits landed in
        for _ in 0..200 {
            let (engine, gateway) = engine_with_movie();
            let engine = Arc::new(engine);
            let alice = Uuid::new_v4();
            let bob = Uuid::new_v4();
            let room = engine
                .create_room(alice, "movie-night".to_string(), "alice".to_string(), None)
                .await
                .unwrap();
            engine
                .join_room(bob, room.id, "bob".to_string(), None)
                .await
                .unwrap();
            gateway.take();

            let playing = engine.clone();
            let pausing = engine.clone();
            let t1 =
                tokio::spawn(async move { playing.play(alice, Duration::from_secs(1)).await });
            let t2 =
                tokio::spawn(async move { pausing.pause(bob, Duration::from_secs(2)).await });
            t1.await.unwrap().unwrap();
            t2.await.unwrap().unwrap();

            let view = engine.room_public_view(room.id).await.unwrap();
            let log = gateway.take();
            let last = log
                .iter()
                .rev()
                .find_map(|d| match d {
                    Delivery::Room(_, event @ (SyncEvent::Play { .. } | SyncEvent::Pause { .. })) => {
                        Some(event.clone())
                    }
                    _ => None,
                })
                .unwrap();
            match last {
                SyncEvent::Play { .. } => assert!(view.is_playing),
                SyncEvent::Pause { .. } => assert!(!view.is_playing),
                _ => unreachable!(),
            }
        }
    }

    #[tokio::test]
    async fn test_change_movie_requires_host() {
        let (engine, gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let room = engine
            .create_room(alice, "movie-night".to_string(), "alice".to_string(), None)
            .await
            .unwrap();
        engine
            .join_room(bob, room.id, "bob".to_string(), None)
            .await
            .unwrap();
        gateway.take();

        let result = engine.change_movie(bob, "m1").await;
        assert!(matches!(result, Err(Error::NotHost)));

        // Single unicast error to bob, no broadcast, no state change
        let log = gateway.take();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            Delivery::Caller(to, SyncEvent::Error { kind, .. })
                if *to == bob && *kind == ErrorKind::NotHost
        ));
        let view = engine.room_public_view(room.id).await.unwrap();
        assert!(view.current_movie_id.is_none());
    }

    #[tokio::test]
    async fn test_change_movie_unknown_id() {
        let (engine, gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        engine
            .create_room(alice, "movie-night".to_string(), "alice".to_string(), None)
            .await
            .unwrap();
        gateway.take();

        let result = engine.change_movie(alice, "nope").await;
        assert!(matches!(result, Err(Error::MovieNotFound(_))));
        let log = gateway.take();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            Delivery::Caller(_, SyncEvent::Error { kind, .. })
                if *kind == ErrorKind::MovieNotFound
        ));
    }

    #[tokio::test]
    async fn test_join_wrong_password_gets_unicast_error() {
        let (engine, gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let room = engine
            .create_room(
                alice,
                "locked".to_string(),
                "alice".to_string(),
                Some("secret".to_string()),
            )
            .await
            .unwrap();
        gateway.take();

        let result = engine
            .join_room(bob, room.id, "bob".to_string(), Some("x".to_string()))
            .await;
        assert!(matches!(result, Err(Error::InvalidPassword)));
        let log = gateway.take();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            Delivery::Caller(to, SyncEvent::Error { kind, .. })
                if *to == bob && *kind == ErrorKind::InvalidPassword
        ));

        engine
            .join_room(bob, room.id, "bob".to_string(), Some("secret".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_play_outside_room() {
        let (engine, gateway) = engine_with_movie();
        let stranger = Uuid::new_v4();

        let result = engine.play(stranger, Duration::ZERO).await;
        assert!(matches!(result, Err(Error::NotInRoom)));
        let log = gateway.take();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            Delivery::Caller(to, SyncEvent::Error { kind, .. })
                if *to == stranger && *kind == ErrorKind::NotInRoom
        ));
    }

    #[tokio::test]
    async fn test_disconnect_migrates_host_and_notifies() {
        let (engine, gateway) = engine_with_movie();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let room = engine
            .create_room(a, "movie-night".to_string(), "a".to_string(), None)
            .await
            .unwrap();
        engine.join_room(b, room.id, "b".to_string(), None).await.unwrap();
        engine.join_room(c, room.id, "c".to_string(), None).await.unwrap();
        gateway.take();

        engine.disconnect(a).await;
        let log = gateway.take();
        assert_eq!(log.len(), 2);
        assert!(matches!(
            &log[0],
            Delivery::Room(r, SyncEvent::UserLeft { user })
                if *r == room.id && user.connection_id == a
        ));
        assert!(matches!(
            &log[1],
            Delivery::Room(r, SyncEvent::HostChanged { host_connection_id })
                if *r == room.id && *host_connection_id == b
        ));

        // Second disconnect is a no-op
        engine.disconnect(a).await;
        assert!(gateway.take().is_empty());

        let view = engine.room_public_view(room.id).await.unwrap();
        assert_eq!(view.users[0].connection_id, b);
        assert!(view.users[0].is_host);
    }

    #[tokio::test]
    async fn test_late_joiner_receives_movie_and_state() {
        let (engine, gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let room = engine
            .create_room(alice, "movie-night".to_string(), "alice".to_string(), None)
            .await
            .unwrap();
        engine.change_movie(alice, "m1").await.unwrap();
        engine.play(alice, Duration::from_secs(30)).await.unwrap();
        gateway.take();

        engine
            .join_room(bob, room.id, "bob".to_string(), None)
            .await
            .unwrap();
        let log = gateway.take();
        assert_eq!(log.len(), 4);
        assert!(matches!(&log[0], Delivery::Caller(to, SyncEvent::RoomJoined { .. }) if *to == bob));
        assert!(matches!(
            &log[1],
            Delivery::RoomExcept(_, _, SyncEvent::UserJoined { .. })
        ));
        assert!(matches!(
            &log[2],
            Delivery::Caller(to, SyncEvent::MovieChanged { movie })
                if *to == bob && movie.id == "m1"
        ));
        assert!(matches!(
            &log[3],
            Delivery::Caller(to, SyncEvent::SyncState { position, is_playing })
                if *to == bob && *position == Duration::from_secs(30) && *is_playing
        ));
    }

    #[tokio::test]
    async fn test_switching_rooms_notifies_old_room() {
        let (engine, gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let first = engine
            .create_room(alice, "first".to_string(), "alice".to_string(), None)
            .await
            .unwrap();
        engine
            .join_room(bob, first.id, "bob".to_string(), None)
            .await
            .unwrap();
        let second = engine
            .create_room(bob, "second".to_string(), "bob".to_string(), None)
            .await
            .unwrap();
        let log = gateway.take();

        // Bob's departure reaches the first room before his new room events
        let departure = log.iter().position(|d| {
            matches!(
                d,
                Delivery::Room(r, SyncEvent::UserLeft { user })
                    if *r == first.id && user.connection_id == bob
            )
        });
        let created = log.iter().position(|d| {
            matches!(d, Delivery::Caller(to, SyncEvent::RoomCreated { .. }) if *to == bob)
        });
        assert!(departure.unwrap() < created.unwrap());
        assert_eq!(second.users.len(), 1);
        assert!(second.users[0].is_host);
    }

    #[tokio::test]
    async fn test_send_message_relays_chat() {
        let (engine, gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        let room = engine
            .create_room(alice, "movie-night".to_string(), "alice".to_string(), None)
            .await
            .unwrap();
        gateway.take();

        engine
            .send_message(alice, "hello there".to_string())
            .await
            .unwrap();
        let log = gateway.take();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            Delivery::Room(r, SyncEvent::MessageReceived { username, message, .. })
                if *r == room.id && username == "alice" && message == "hello there"
        ));
    }

    #[tokio::test]
    async fn test_listing_redacts_passwords() {
        let (engine, _gateway) = engine_with_movie();
        let alice = Uuid::new_v4();
        engine
            .create_room(
                alice,
                "locked".to_string(),
                "alice".to_string(),
                Some("secret".to_string()),
            )
            .await
            .unwrap();

        let rooms = engine.list_active_rooms().await;
        assert_eq!(rooms.len(), 1);
        assert!(rooms[0].has_password);
        assert_eq!(rooms[0].user_count, 1);
    }
}
