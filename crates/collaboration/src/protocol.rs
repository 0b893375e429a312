/// Line protocol spoken between sessions and the server
///
/// Every inbound line is one command. Outbound traffic is a human-readable audit
/// stream: `APPLY ...` and `SNAPSHOT ...` go to every session, `DOC`, `VERSIONS`
/// and `ERR` only to the requester.
use document::VersionId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Commands accepted from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Insert { position: i64, text: String },
    Delete { position: i64 },
    Update { position: i64, text: String },
    Undo,
    Redo,
    /// `SNAP` branches from the root, `SNAP <id>` from the given version
    Snapshot { parent: Option<VersionId> },
    Restore { version: VersionId },
    Versions,
    Get,
    Print,
}

/// Rejections reported back to the requesting session only
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid position {0}")]
    InvalidPosition(i64),

    #[error("unknown command")]
    UnknownCommand,

    #[error("snapshot not found {0}")]
    SnapshotNotFound(VersionId),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.strip_suffix('\n').unwrap_or(line);

        if let Some(rest) = line.strip_prefix("INS ") {
            let (position, text) = position_and_text(rest)?;
            return Ok(Command::Insert { position, text });
        }
        if let Some(rest) = line.strip_prefix("DEL ") {
            let position = parse_position(rest.trim_matches(' '))?;
            return Ok(Command::Delete { position });
        }
        if let Some(rest) = line.strip_prefix("UPD ") {
            let (position, text) = position_and_text(rest)?;
            return Ok(Command::Update { position, text });
        }
        if let Some(rest) = line.strip_prefix("SNAP ") {
            let parent = parse_version(rest.trim_matches(' '))?;
            return Ok(Command::Snapshot {
                parent: Some(parent),
            });
        }
        if let Some(rest) = line.strip_prefix("RESTORE ") {
            let version = parse_version(rest.trim_matches(' '))?;
            return Ok(Command::Restore { version });
        }

        match line {
            "UNDO" => Ok(Command::Undo),
            "REDO" => Ok(Command::Redo),
            "SNAP" => Ok(Command::Snapshot { parent: None }),
            "VERSIONS" => Ok(Command::Versions),
            "GET" => Ok(Command::Get),
            "PRINT" => Ok(Command::Print),
            _ => Err(CommandError::UnknownCommand),
        }
    }
}

/// Split `<pos> <text>`; the text is everything after the spaces that follow the
/// position and may be empty.
fn position_and_text(rest: &str) -> Result<(i64, String), CommandError> {
    let rest = rest.trim_start_matches(' ');
    let (token, text) = rest.split_once(' ').unwrap_or((rest, ""));
    let position = parse_position(token)?;
    Ok((position, text.trim_start_matches(' ').to_string()))
}

fn parse_position(token: &str) -> Result<i64, CommandError> {
    token.parse().map_err(|_| CommandError::UnknownCommand)
}

/// Accepts `3` or `v3`.
fn parse_version(token: &str) -> Result<VersionId, CommandError> {
    let digits = token.strip_prefix('v').unwrap_or(token);
    digits
        .parse()
        .map(VersionId)
        .map_err(|_| CommandError::UnknownCommand)
}

/// Broadcast after a command has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Insert { position: usize, text: String },
    Delete { position: usize },
    Update { position: usize, text: String },
    Undo,
    Redo,
    Restore { version: VersionId },
    Snapshot { version: VersionId },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Insert { position, text } => write!(f, "APPLY INS {} {}", position, text),
            Notification::Delete { position } => write!(f, "APPLY DEL {}", position),
            Notification::Update { position, text } => write!(f, "APPLY UPD {} {}", position, text),
            Notification::Undo => write!(f, "APPLY UNDO"),
            Notification::Redo => write!(f, "APPLY REDO"),
            Notification::Restore { version } => write!(f, "APPLY RESTORE {}", version),
            Notification::Snapshot { version } => write!(f, "SNAPSHOT {}", version),
        }
    }
}

impl Notification {
    pub fn to_wire(&self) -> String {
        format!("{}\n", self)
    }
}

/// Sent to the requesting session only
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `DOC <count>` followed by the serialized document
    Document { count: usize, text: String },
    /// `VERSIONS <n>` followed by one rendered node per line
    Versions { lines: Vec<String> },
    Error(CommandError),
}

impl Reply {
    pub fn to_wire(&self) -> String {
        match self {
            Reply::Document { count, text } => format!("DOC {}\n{}", count, text),
            Reply::Versions { lines } => {
                let mut out = format!("VERSIONS {}\n", lines.len());
                for line in lines {
                    out.push_str(line);
                    out.push('\n');
                }
                out
            }
            Reply::Error(err) => format!("ERR {}\n", err),
        }
    }
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::Error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, CommandError> {
        line.parse()
    }

    #[test]
    fn test_parse_insert() {
        assert_eq!(
            parse("INS 0 hello world"),
            Ok(Command::Insert {
                position: 0,
                text: "hello world".to_string()
            })
        );
        assert_eq!(
            parse("INS 3   spaced"),
            Ok(Command::Insert {
                position: 3,
                text: "spaced".to_string()
            })
        );
    }

    #[test]
    fn test_parse_empty_text() {
        assert_eq!(
            parse("INS 2"),
            Ok(Command::Insert {
                position: 2,
                text: String::new()
            })
        );
        assert_eq!(
            parse("UPD 1 "),
            Ok(Command::Update {
                position: 1,
                text: String::new()
            })
        );
    }

    #[test]
    fn test_parse_negative_position_is_kept_for_validation() {
        assert_eq!(parse("DEL -1"), Ok(Command::Delete { position: -1 }));
    }

    #[test]
    fn test_parse_strips_trailing_newline() {
        assert_eq!(parse("UNDO\n"), Ok(Command::Undo));
        assert_eq!(parse("DEL 4\n"), Ok(Command::Delete { position: 4 }));
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse("REDO"), Ok(Command::Redo));
        assert_eq!(parse("GET"), Ok(Command::Get));
        assert_eq!(parse("PRINT"), Ok(Command::Print));
        assert_eq!(parse("VERSIONS"), Ok(Command::Versions));
        assert_eq!(parse("SNAP"), Ok(Command::Snapshot { parent: None }));
        assert_eq!(
            parse("SNAP v2"),
            Ok(Command::Snapshot {
                parent: Some(VersionId(2))
            })
        );
        assert_eq!(
            parse("RESTORE 3"),
            Ok(Command::Restore {
                version: VersionId(3)
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for line in [
            "",
            "ins 0 x",
            "INS",
            "INS x hello",
            "DEL",
            "DEL 1 2",
            "UNDO now",
            "RESTORE",
            "RESTORE vx",
            "SNAP -1",
            "INS 99999999999999999999 x",
        ] {
            assert_eq!(parse(line), Err(CommandError::UnknownCommand), "{:?}", line);
        }
    }

    #[test]
    fn test_notification_wire_format() {
        let ins = Notification::Insert {
            position: 0,
            text: "hello".to_string(),
        };
        assert_eq!(ins.to_wire(), "APPLY INS 0 hello\n");
        assert_eq!(Notification::Delete { position: 2 }.to_wire(), "APPLY DEL 2\n");
        assert_eq!(Notification::Undo.to_wire(), "APPLY UNDO\n");
        assert_eq!(
            Notification::Snapshot {
                version: VersionId(1)
            }
            .to_wire(),
            "SNAPSHOT v1\n"
        );
        assert_eq!(
            Notification::Restore {
                version: VersionId(4)
            }
            .to_wire(),
            "APPLY RESTORE v4\n"
        );
    }

    #[test]
    fn test_reply_wire_format() {
        let doc = Reply::Document {
            count: 1,
            text: "hello\n".to_string(),
        };
        assert_eq!(doc.to_wire(), "DOC 1\nhello\n");

        let empty = Reply::Document {
            count: 0,
            text: String::new(),
        };
        assert_eq!(empty.to_wire(), "DOC 0\n");

        assert_eq!(
            Reply::from(CommandError::InvalidPosition(5)).to_wire(),
            "ERR invalid position 5\n"
        );
        assert_eq!(
            Reply::Error(CommandError::UnknownCommand).to_wire(),
            "ERR unknown command\n"
        );

        let versions = Reply::Versions {
            lines: vec!["v1: a\\n".to_string(), "  v2: b\\n".to_string()],
        };
        assert_eq!(versions.to_wire(), "VERSIONS 2\nv1: a\\n\n  v2: b\\n\n");
    }
}
