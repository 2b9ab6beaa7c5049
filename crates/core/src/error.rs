//! Error types for the synchronization engine
//!
//! Every kind here is recoverable by the caller: the operation that raised
//! it performed no mutation, and exactly one `Error` event is unicast back
//! to the invoking connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("You are not in a room. Please join a room first.")]
    NotInRoom,

    #[error("Only the room host can change movies.")]
    NotHost,

    #[error("Movie not found with ID: {0}")]
    MovieNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error discriminant carried by the `Error` event,
/// so clients can branch without matching message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RoomNotFound,
    InvalidPassword,
    NotInRoom,
    NotHost,
    MovieNotFound,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RoomNotFound => ErrorKind::RoomNotFound,
            Error::InvalidPassword => ErrorKind::InvalidPassword,
            Error::NotInRoom => ErrorKind::NotInRoom,
            Error::NotHost => ErrorKind::NotHost,
            Error::MovieNotFound(_) => ErrorKind::MovieNotFound,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}
