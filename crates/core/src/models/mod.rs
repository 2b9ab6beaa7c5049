//! Data models for watchsync

mod movie;
mod room;
mod user;

pub use movie::*;
pub use room::*;
pub use user::*;
