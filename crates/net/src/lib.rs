//! WatchSync Network Library
//!
//! Provides TCP-based networking for synchronized watch parties.
//!
//! # Architecture
//!
//! - **Hub**: Accepts connections, relays commands into the sync engine
//! - **Client**: Connects to a hub and drives one viewer's session
//! - **Protocol**: Length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! // Operator starts a hub
//! let hub = Hub::start(9600, catalog).await?;
//!
//! // Viewer connects
//! let mut client = Client::connect(hub.addr()).await?;
//! client.create_room("movie-night".into(), "alice".into(), None).await?;
//!
//! // Process events
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         SyncEvent::Play { position } => { /* resume local player */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod hub;
pub mod protocol;

pub use client::{Client, ConnectionState};
pub use error::{Error, Result};
pub use hub::{ChannelGateway, Hub};
pub use protocol::ClientCommand;

/// Default port for WatchSync hubs
pub const DEFAULT_PORT: u16 = 9600;
