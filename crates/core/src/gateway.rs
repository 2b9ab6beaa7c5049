//! Broadcast gateway contract
//!
//! The engine's only view of the transport: unicast to one connection,
//! broadcast to a room group, and group membership maintenance. The engine
//! keeps the groups in step with the registry (a connection is added on
//! join and removed on leave), so implementations only track sets.
//!
//! Delivery is fire-and-forget. Implementations must queue without
//! blocking: the engine sends while holding a room's lock (that is what
//! keeps per-room broadcast order equal to commit order), and a stalled
//! peer must not stall the rest of the room.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::events::SyncEvent;

pub trait BroadcastGateway: Send + Sync {
    /// Register a connection as a member of a room group
    fn add_to_group(&self, room_id: Uuid, connection_id: Uuid);

    /// Remove a connection from a room group
    fn remove_from_group(&self, room_id: Uuid, connection_id: Uuid);

    /// Unicast to a single connection
    fn send_to_caller(&self, connection_id: Uuid, event: SyncEvent);

    /// Broadcast to every current member of a room
    fn send_to_room(&self, room_id: Uuid, event: SyncEvent);

    /// Broadcast to every current member of a room except one
    fn send_to_room_except(&self, room_id: Uuid, except: Uuid, event: SyncEvent);

    /// Chat convenience: relay a message to the whole room
    fn send_chat(
        &self,
        room_id: Uuid,
        username: String,
        message: String,
        timestamp: DateTime<Utc>,
    ) {
        self.send_to_room(
            room_id,
            SyncEvent::MessageReceived {
                username,
                message,
                timestamp,
            },
        );
    }
}
