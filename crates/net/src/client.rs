//! TCP client for connecting to a watch-party hub

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use watchsync_core::SyncEvent;

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::ClientCommand;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Client handle for hub operations
pub struct Client {
    state: Arc<RwLock<ConnectionState>>,
    event_rx: mpsc::Receiver<SyncEvent>,
    cmd_tx: mpsc::Sender<Command>,
}

enum Command {
    Send(ClientCommand),
    Disconnect,
}

impl Client {
    /// Connect to a hub
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to hub");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(
            reader,
            writer,
            state.clone(),
            event_tx,
            cmd_rx,
        ));

        Ok(Client {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Get the next event from the hub
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.event_rx.recv().await
    }

    /// Create a room and join it as host
    pub async fn create_room(
        &self,
        name: String,
        username: String,
        password: Option<String>,
    ) -> Result<()> {
        self.send(ClientCommand::CreateRoom {
            name,
            username,
            password,
        })
        .await
    }

    /// Join an existing room
    pub async fn join_room(
        &self,
        room_id: Uuid,
        username: String,
        password: Option<String>,
    ) -> Result<()> {
        self.send(ClientCommand::JoinRoom {
            room_id,
            username,
            password,
        })
        .await
    }

    /// Resume playback at the given offset
    pub async fn play(&self, position: Duration) -> Result<()> {
        self.send(ClientCommand::Play { position }).await
    }

    /// Pause playback at the given offset
    pub async fn pause(&self, position: Duration) -> Result<()> {
        self.send(ClientCommand::Pause { position }).await
    }

    /// Jump to the given offset
    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.send(ClientCommand::Seek { position }).await
    }

    /// Switch the room's movie (host only)
    pub async fn change_movie(&self, movie_id: String) -> Result<()> {
        self.send(ClientCommand::ChangeMovie { movie_id }).await
    }

    /// Send a chat message to the current room
    pub async fn send_message(&self, message: String) -> Result<()> {
        self.send(ClientCommand::SendMessage { message }).await
    }

    /// Request the public room listing
    pub async fn list_rooms(&self) -> Result<()> {
        self.send(ClientCommand::ListRooms).await
    }

    /// Request the public view of one room
    pub async fn get_room(&self, room_id: Uuid) -> Result<()> {
        self.send(ClientCommand::GetRoom { room_id }).await
    }

    /// Disconnect from the hub
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect).await;
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn send(&self, cmd: ClientCommand) -> Result<()> {
        self.cmd_tx
            .send(Command::Send(cmd))
            .await
            .map_err(|_| Error::NotConnected)
    }
}

/// Main connection task
async fn connection_task(
    mut reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ConnectionState>>,
    event_tx: mpsc::Sender<SyncEvent>,
    mut cmd_rx: mpsc::Receiver<Command>,
) {
    loop {
        tokio::select! {
            // Incoming event from the hub
            result = read_frame::<_, SyncEvent>(&mut reader) => {
                match result {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            debug!("Event receiver dropped");
                            break;
                        }
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!("Hub closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            // Outgoing command
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(cmd)) => {
                        if let Err(e) = write_frame(&mut writer, &cmd).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    *state.write().await = ConnectionState::Disconnected;
    info!("Disconnected from hub");
}
