/// Multi-session line editing service
/// One shared document, edited through a line protocol and broadcast to every session
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod codec;
pub use codec::*;

mod config;
pub use config::*;

mod dispatcher;
pub use dispatcher::*;

mod protocol;
pub use protocol::*;

mod registry;
pub use registry::*;

mod server;
pub use server::*;

#[derive(Debug, Error)]
pub enum CollaborationError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session {0} outbound queue is full")]
    SessionLagging(SessionId),

    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CollaborationError>;

/// Identifier of one connected session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
