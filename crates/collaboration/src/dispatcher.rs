/// Per-command validate, mutate and broadcast pipeline
use document::{Document, DocumentError, VersionTree};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    Command, CommandError, InboundLine, Notification, Reply, SessionId, SessionRegistry,
};

/// Everything guarded by the document lock
#[derive(Debug, Default)]
pub struct EditorState {
    pub document: Document,
    pub versions: VersionTree,
}

/// What became of one handled command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Applied and sent to every session
    Broadcast(Notification),
    /// Sent to the requester only
    Reply(Reply),
    /// Written to the server console only
    Console,
    /// Sender is no longer registered; nothing was applied
    Dropped,
}

/// Applies commands to the shared document and fans out the results.
///
/// Lock order is the document lock, then the registry lock. Mutating commands
/// keep the document lock until their notification is queued on every
/// session, so sessions see notifications in the order mutations were applied.
/// Replies that read the document are queued under the same lock. Commands from
/// a session that is not registered, such as one evicted for lagging, are dropped.
pub struct CommandDispatcher {
    state: Mutex<EditorState>,
    registry: Arc<SessionRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_state(EditorState::default(), registry)
    }

    pub fn with_state(state: EditorState, registry: Arc<SessionRegistry>) -> Self {
        Self {
            state: Mutex::new(state),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Run `f` against the current state while holding the document lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&EditorState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Handle one decoded frame from `session`.
    pub fn handle_inbound(&self, frame: InboundLine, session: SessionId) -> Delivery {
        if !self.registry.contains(session) {
            return detached(session);
        }
        match frame {
            InboundLine::Command(line) => self.handle(&line, session),
            InboundLine::Overlong | InboundLine::Malformed => {
                warn!(session = %session, ?frame, "unreadable command line");
                self.reject(session, CommandError::UnknownCommand)
            }
        }
    }

    /// Handle one command line from `session`.
    pub fn handle(&self, line: &str, session: SessionId) -> Delivery {
        if !self.registry.contains(session) {
            return detached(session);
        }
        let delivery = match line.parse::<Command>() {
            Ok(command) => {
                debug!(session = %session, ?command, "dispatching");
                self.execute(command, session)
            }
            Err(err) => Err(err),
        };

        match delivery {
            Ok(delivery) => delivery,
            Err(err) => self.reject(session, err),
        }
    }

    fn reject(&self, session: SessionId, err: CommandError) -> Delivery {
        debug!(session = %session, %err, "command rejected");
        let reply = Reply::Error(err);
        self.reply(session, &reply);
        Delivery::Reply(reply)
    }

    fn reply(&self, session: SessionId, reply: &Reply) {
        if let Err(e) = self.registry.send_to(session, reply.to_wire()) {
            warn!(session = %session, "failed to reply: {}", e);
        }
    }

    fn execute(&self, command: Command, session: SessionId) -> Result<Delivery, CommandError> {
        let mut guard = self.state.lock();
        // Eviction may have happened while waiting for the lock
        if !self.registry.contains(session) {
            return Ok(detached(session));
        }
        let EditorState { document, versions } = &mut *guard;

        let notification = match command {
            Command::Insert { position, text } => {
                let pos = checked_position(position, |p| document.is_valid_insert_position(p))?;
                document
                    .insert(pos, text.clone())
                    .map_err(|e| reject_document(e, position))?;
                Notification::Insert {
                    position: pos,
                    text,
                }
            }
            Command::Delete { position } => {
                let pos = checked_position(position, |p| document.is_valid_mutate_position(p))?;
                document
                    .delete(pos)
                    .map_err(|e| reject_document(e, position))?;
                Notification::Delete { position: pos }
            }
            Command::Update { position, text } => {
                let pos = checked_position(position, |p| document.is_valid_mutate_position(p))?;
                document
                    .update(pos, text.clone())
                    .map_err(|e| reject_document(e, position))?;
                Notification::Update {
                    position: pos,
                    text,
                }
            }
            Command::Undo => {
                match document.undo() {
                    Ok(op) => debug!(op = op.verb(), position = op.position(), "undone"),
                    Err(_) => info!("nothing to undo"),
                }
                Notification::Undo
            }
            Command::Redo => {
                match document.redo() {
                    Ok(op) => debug!(op = op.verb(), position = op.position(), "redone"),
                    Err(_) => info!("nothing to redo"),
                }
                Notification::Redo
            }
            Command::Snapshot { parent } => {
                let parent = parent.or_else(|| versions.root().map(|root| root.id));
                let node = versions
                    .snapshot(document, parent)
                    .map_err(|e| reject_document(e, 0))?;
                info!(version = %node.id, lines = node.line_count, "snapshot taken");
                Notification::Snapshot { version: node.id }
            }
            Command::Restore { version } => {
                let node = versions
                    .restore(version, document)
                    .map_err(|e| reject_document(e, 0))?;
                info!(version = %node.id, lines = document.len(), "snapshot restored");
                Notification::Restore { version }
            }
            Command::Versions => {
                let reply = Reply::Versions {
                    lines: versions.render(),
                };
                self.reply(session, &reply);
                return Ok(Delivery::Reply(reply));
            }
            Command::Get => {
                let reply = Reply::Document {
                    count: document.len(),
                    text: document.serialize(),
                };
                self.reply(session, &reply);
                return Ok(Delivery::Reply(reply));
            }
            Command::Print => {
                for line in document.numbered_lines() {
                    info!(target: "document", "{}", line);
                }
                return Ok(Delivery::Console);
            }
        };

        let delivered = self.registry.broadcast(&notification.to_wire());
        debug!(sessions = delivered, "{}", notification);
        drop(guard);

        Ok(Delivery::Broadcast(notification))
    }
}

fn detached(session: SessionId) -> Delivery {
    debug!(session = %session, "ignoring command from unregistered session");
    Delivery::Dropped
}

/// Convert a wire position, rejecting negatives and anything `valid` refuses.
fn checked_position(
    raw: i64,
    valid: impl FnOnce(usize) -> bool,
) -> Result<usize, CommandError> {
    usize::try_from(raw)
        .ok()
        .filter(|pos| valid(*pos))
        .ok_or(CommandError::InvalidPosition(raw))
}

fn reject_document(err: DocumentError, position: i64) -> CommandError {
    match err {
        DocumentError::InvalidPosition(_) => CommandError::InvalidPosition(position),
        DocumentError::SnapshotNotFound(id) => CommandError::SnapshotNotFound(id),
        DocumentError::HistoryEmpty(_) => CommandError::UnknownCommand,
    }
}
