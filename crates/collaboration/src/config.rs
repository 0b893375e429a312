use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 9000;
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind: SocketAddr,

    /// Longest accepted command line in bytes, excluding the newline
    pub max_line_length: usize,

    /// Messages buffered per session before it is considered lagging and evicted
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}
