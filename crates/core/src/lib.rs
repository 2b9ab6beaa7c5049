//! watchsync core library
//!
//! The room/session synchronization engine: rooms, membership, host role,
//! the playback state machine, and the event vocabulary a transport relays
//! to clients. Transport and video catalog are external; this crate only
//! speaks to them through the [`BroadcastGateway`] and [`MovieCatalog`]
//! contracts.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod invariants;
pub mod models;
pub mod registry;

pub use catalog::{InMemoryCatalog, MovieCatalog};
pub use engine::SyncEngine;
pub use error::{Error, ErrorKind, Result};
pub use events::SyncEvent;
pub use gateway::BroadcastGateway;
pub use models::*;
pub use registry::{JoinOutcome, LeaveOutcome, PlaybackState, SessionRegistry};
