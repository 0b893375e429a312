/// Accept loop and per-connection session handling
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::{CommandDispatcher, CommandLineCodec, Result, ServerConfig};

/// Time allowed to flush queued messages to a departing session
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Accepts connections and runs one session task per connection
pub struct ConnectionListener {
    listener: TcpListener,
    dispatcher: Arc<CommandDispatcher>,
    config: ServerConfig,
}

impl ConnectionListener {
    pub async fn bind(config: ServerConfig, dispatcher: Arc<CommandDispatcher>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind).await?;
        Ok(Self {
            listener,
            dispatcher,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> Result<()> {
        info!("Line editing server listening on: {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from: {}", addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                    }
                    tokio::spawn(handle_connection(
                        stream,
                        addr.to_string(),
                        self.dispatcher.clone(),
                        self.config.max_line_length,
                    ));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Serve one session over `stream` until the peer disconnects, the read fails,
/// or the session is evicted for lagging. An evicted session stops reading at
/// once and gets [`DRAIN_TIMEOUT`] to take what was already queued for it.
pub async fn handle_connection<S>(
    stream: S,
    peer: String,
    dispatcher: Arc<CommandDispatcher>,
    max_line_length: usize,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (session, mut outbound) = dispatcher.registry().register(peer.clone());
    let Some(evicted) = dispatcher.registry().eviction_signal(session) else {
        warn!(session = %session, "Session evicted before it started: {}", peer);
        return;
    };
    info!(session = %session, "Session connected: {}", peer);

    let (reader, writer) = tokio::io::split(stream);
    let mut inbound = FramedRead::new(reader, CommandLineCodec::new(max_line_length));
    let mut sink = FramedWrite::new(writer, CommandLineCodec::new(max_line_length));

    // Task to send queued messages to the peer
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = sink.send(message).await {
                debug!("Failed to send message: {}", e);
                break;
            }
        }
    });
    let mut writer_finished = false;

    loop {
        tokio::select! {
            biased;
            _ = evicted.cancelled() => {
                warn!(session = %session, "Session evicted: {}", peer);
                break;
            }
            frame = inbound.next() => match frame {
                Some(Ok(frame)) => {
                    dispatcher.handle_inbound(frame, session);
                }
                Some(Err(e)) => {
                    error!(session = %session, "Error reading from {}: {}", peer, e);
                    break;
                }
                None => break,
            },
            _ = &mut send_task => {
                writer_finished = true;
                warn!(session = %session, "Outbound queue closed for {}", peer);
                break;
            }
        }
    }

    if let Some(info) = dispatcher.registry().unregister(session) {
        let duration = chrono::Utc::now() - info.connected_at;
        info!(
            session = %session,
            seconds = duration.num_seconds(),
            "Session disconnected: {}",
            peer
        );
    }

    if !writer_finished && tokio::time::timeout(DRAIN_TIMEOUT, &mut send_task).await.is_err() {
        send_task.abort();
    }
    info!("Connection closed: {}", peer);
}
