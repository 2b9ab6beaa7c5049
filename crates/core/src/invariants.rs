//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible room states during
//! development. These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::Room;

/// Validate that a Room's state is internally consistent
pub fn assert_room_invariants(room: &Room) {
    // Name must not be empty
    debug_assert!(
        !room.name.trim().is_empty(),
        "Room {} has empty name",
        room.id
    );

    // A room with members has exactly one host; an empty room has none
    let host_count = room.users.iter().filter(|u| u.is_host).count();
    if room.users.is_empty() {
        debug_assert!(
            room.host_connection_id.is_none(),
            "Empty room {} still has host {:?}",
            room.id,
            room.host_connection_id
        );
    } else {
        debug_assert!(
            host_count == 1,
            "Room {} has {} hosts, expected exactly 1",
            room.id,
            host_count
        );

        let host = room.users.iter().find(|u| u.is_host);
        debug_assert!(
            room.host_connection_id == host.map(|u| u.connection_id),
            "Room {} host_connection_id {:?} does not match host user {:?}",
            room.id,
            room.host_connection_id,
            host.map(|u| u.connection_id)
        );
    }

    // Every member must point back at this room, and appear once
    for user in &room.users {
        debug_assert!(
            user.room_id == Some(room.id),
            "User {} in room {} has room_id {:?}",
            user.connection_id,
            room.id,
            user.room_id
        );
    }
    for (i, user) in room.users.iter().enumerate() {
        debug_assert!(
            !room.users[i + 1..]
                .iter()
                .any(|u| u.connection_id == user.connection_id),
            "Connection {} appears twice in room {}",
            user.connection_id,
            room.id
        );
    }
}

/// Validate that a connection id is not nil
pub fn assert_connection_id_valid(connection_id: Uuid, context: &str) {
    debug_assert!(
        connection_id != Uuid::nil(),
        "Nil connection_id in context: {}",
        context
    );
}
