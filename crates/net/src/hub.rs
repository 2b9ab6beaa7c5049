//! TCP hub - the connection-oriented transport in front of the engine
//!
//! Accepts connections, assigns each a connection id, relays inbound
//! commands into the engine, and delivers outbound events through per-peer
//! channels. Disconnection is an implicit leave.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use watchsync_core::{BroadcastGateway, MovieCatalog, SyncEngine, SyncEvent};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::ClientCommand;

/// Gateway over per-connection channels.
///
/// Sends never block: events are queued on unbounded channels so a stalled
/// peer cannot hold up a room; a closed peer's events are dropped and the
/// connection's cleanup path removes it.
#[derive(Debug, Default)]
pub struct ChannelGateway {
    /// Live connections and their outbound queues
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<SyncEvent>>>,
    /// Room id -> member connections, maintained by the engine
    groups: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl ChannelGateway {
    fn register(&self, connection_id: Uuid, tx: mpsc::UnboundedSender<SyncEvent>) {
        self.connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(connection_id, tx);
    }

    fn unregister(&self, connection_id: Uuid) {
        self.connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&connection_id);
    }

    fn send(&self, connection_id: Uuid, event: SyncEvent) {
        let connections = self.connections.read().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = connections.get(&connection_id) {
            if tx.send(event).is_err() {
                debug!(connection_id = %connection_id, "Peer queue gone, event dropped");
            }
        }
    }

    fn group_members(&self, room_id: Uuid) -> Vec<Uuid> {
        let groups = self.groups.read().unwrap_or_else(|e| e.into_inner());
        groups
            .get(&room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl BroadcastGateway for ChannelGateway {
    fn add_to_group(&self, room_id: Uuid, connection_id: Uuid) {
        let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
        groups.entry(room_id).or_default().insert(connection_id);
    }

    fn remove_from_group(&self, room_id: Uuid, connection_id: Uuid) {
        let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
        if let Some(members) = groups.get_mut(&room_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                groups.remove(&room_id);
            }
        }
    }

    fn send_to_caller(&self, connection_id: Uuid, event: SyncEvent) {
        self.send(connection_id, event);
    }

    fn send_to_room(&self, room_id: Uuid, event: SyncEvent) {
        for member in self.group_members(room_id) {
            self.send(member, event.clone());
        }
    }

    fn send_to_room_except(&self, room_id: Uuid, except: Uuid, event: SyncEvent) {
        for member in self.group_members(room_id) {
            if member != except {
                self.send(member, event.clone());
            }
        }
    }
}

/// Hub server handle
pub struct Hub {
    addr: SocketAddr,
    engine: Arc<SyncEngine>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Hub {
    /// Start the hub on the given port (0 picks a free one)
    pub async fn start(port: u16, catalog: Arc<dyn MovieCatalog>) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        let gateway = Arc::new(ChannelGateway::default());
        let engine = Arc::new(SyncEngine::new(catalog, gateway.clone()));

        info!(addr = %bound_addr, "Hub started");

        let (shutdown_tx, _) = broadcast::channel(1);
        tokio::spawn(accept_loop(
            listener,
            engine.clone(),
            gateway,
            shutdown_tx.subscribe(),
        ));

        Ok(Hub {
            addr: bound_addr,
            engine,
            shutdown_tx,
        })
    }

    /// Get the hub's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The engine behind this hub (read-only queries, tooling)
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Stop accepting connections
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Hub shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    engine: Arc<SyncEngine>,
    gateway: Arc<ChannelGateway>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            engine.clone(),
                            gateway.clone(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    engine: Arc<SyncEngine>,
    gateway: Arc<ChannelGateway>,
) {
    let connection_id = Uuid::new_v4();
    let (mut reader, writer) = tokio::io::split(stream);

    let (tx, rx) = mpsc::unbounded_channel();
    gateway.register(connection_id, tx);
    let writer_handle = tokio::spawn(writer_task(writer, rx));

    info!(addr = %addr, connection_id = %connection_id, "Peer connected");

    // Read loop
    loop {
        match read_frame::<_, ClientCommand>(&mut reader).await {
            Ok(cmd) => {
                dispatch(&engine, &gateway, connection_id, cmd).await;
            }
            Err(Error::ConnectionClosed) => {
                debug!(connection_id = %connection_id, "Connection closed");
                break;
            }
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Read error");
                break;
            }
        }
    }

    // Cleanup: implicit leave, then drop the outbound channel
    engine.disconnect(connection_id).await;
    gateway.unregister(connection_id);
    writer_handle.abort();

    info!(connection_id = %connection_id, "Peer disconnected");
}

/// Writer task - delivers queued events to the client
async fn writer_task(
    mut writer: WriteHalf<TcpStream>,
    mut rx: mpsc::UnboundedReceiver<SyncEvent>,
) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &event).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}

/// Route one inbound command into the engine.
///
/// Mutating operations report their own errors back to the caller; the
/// results are ignored here.
async fn dispatch(
    engine: &SyncEngine,
    gateway: &ChannelGateway,
    connection_id: Uuid,
    cmd: ClientCommand,
) {
    match cmd {
        ClientCommand::CreateRoom {
            name,
            username,
            password,
        } => {
            let _ = engine
                .create_room(connection_id, name, username, password)
                .await;
        }
        ClientCommand::JoinRoom {
            room_id,
            username,
            password,
        } => {
            let _ = engine
                .join_room(connection_id, room_id, username, password)
                .await;
        }
        ClientCommand::Play { position } => {
            let _ = engine.play(connection_id, position).await;
        }
        ClientCommand::Pause { position } => {
            let _ = engine.pause(connection_id, position).await;
        }
        ClientCommand::Seek { position } => {
            let _ = engine.seek(connection_id, position).await;
        }
        ClientCommand::ChangeMovie { movie_id } => {
            let _ = engine.change_movie(connection_id, &movie_id).await;
        }
        ClientCommand::SendMessage { message } => {
            let _ = engine.send_message(connection_id, message).await;
        }
        ClientCommand::ListRooms => {
            let rooms = engine.list_active_rooms().await;
            gateway.send_to_caller(connection_id, SyncEvent::RoomList { rooms });
        }
        ClientCommand::GetRoom { room_id } => match engine.room_public_view(room_id).await {
            Some(room) => {
                gateway.send_to_caller(connection_id, SyncEvent::RoomView { room });
            }
            None => {
                gateway.send_to_caller(
                    connection_id,
                    SyncEvent::error(&watchsync_core::Error::RoomNotFound),
                );
            }
        },
    }
}
