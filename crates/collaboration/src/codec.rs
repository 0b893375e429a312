/// Newline framing for session traffic
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// One inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundLine {
    Command(String),
    /// Longer than the configured limit; the rest of the line is discarded
    Overlong,
    /// Not valid UTF-8
    Malformed,
}

/// Splits inbound bytes on `\n` and writes outbound messages verbatim.
///
/// Unlike `LinesCodec`, an over-length line does not end the stream: it yields
/// [`InboundLine::Overlong`] once and decoding resumes after the next newline.
/// Empty lines are skipped. The length limit excludes the line terminator,
/// whether that is `\n` or `\r\n`.
#[derive(Debug, Clone)]
pub struct CommandLineCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
}

impl CommandLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    /// Whether an unterminated `buf` can no longer fit within the limit.
    fn exceeds_limit(&self, buf: &BytesMut) -> bool {
        match buf.len().cmp(&self.max_length.saturating_add(1)) {
            std::cmp::Ordering::Less => false,
            // Room for a `\r` right before the newline
            std::cmp::Ordering::Equal => buf[self.max_length] != b'\r',
            std::cmp::Ordering::Greater => true,
        }
    }

    fn frame(mut line: BytesMut) -> Option<InboundLine> {
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if line.is_empty() {
            return None;
        }
        Some(match String::from_utf8(line.to_vec()) {
            Ok(text) => InboundLine::Command(text),
            Err(_) => InboundLine::Malformed,
        })
    }
}

impl Decoder for CommandLineCodec {
    type Item = InboundLine;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<InboundLine>, io::Error> {
        loop {
            if self.discarding {
                match buf.iter().position(|b| *b == b'\n') {
                    Some(offset) => {
                        buf.advance(offset + 1);
                        self.discarding = false;
                        self.next_index = 0;
                    }
                    None => {
                        buf.clear();
                        return Ok(None);
                    }
                }
                continue;
            }

            let read_to = std::cmp::min(self.max_length.saturating_add(2), buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match newline {
                Some(offset) => {
                    let idx = self.next_index + offset;
                    self.next_index = 0;
                    let mut line = buf.split_to(idx + 1);
                    line.truncate(idx);
                    let content = idx - usize::from(line.last() == Some(&b'\r'));
                    if content > self.max_length {
                        return Ok(Some(InboundLine::Overlong));
                    }
                    if let Some(frame) = Self::frame(line) {
                        return Ok(Some(frame));
                    }
                }
                None if self.exceeds_limit(buf) => {
                    self.discarding = true;
                    return Ok(Some(InboundLine::Overlong));
                }
                None => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<InboundLine>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        self.next_index = 0;
        if self.discarding {
            self.discarding = false;
            buf.clear();
            return Ok(None);
        }
        // Final line without a terminator
        let line = buf.split_to(buf.len());
        Ok(Self::frame(line))
    }
}

impl Encoder<String> for CommandLineCodec {
    type Error = io::Error;

    fn encode(&mut self, message: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(message.len());
        dst.put_slice(message.as_bytes());
        Ok(())
    }
}
