//! Command transports.
//!
//! Every transport reads requests on background threads and hands complete lines to the main
//! loop through a bounded channel, so world access never leaves the loop thread.

pub mod pipe;
pub mod protocol;
pub mod server;

use anyhow::Result;
use protocol::Envelope;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Capacity of the reader-to-loop queue.
pub const CHANNEL_CAPACITY: usize = 256;

/// Line-oriented request/response transport.
pub trait CommandChannel {
    /// Wait up to `timeout` for the next request line.
    fn receive(&mut self, timeout: Duration) -> Option<String>;

    /// Deliver the response to the most recent request, or an unsolicited envelope when no
    /// request is outstanding.
    fn send(&mut self, envelope: &Envelope) -> Result<()>;
}

/// Messages from transport threads to the main loop.
pub enum ChannelMsg {
    Connected {
        peer: String,
    },
    Disconnected {
        peer: String,
    },
    Line {
        line: String,
        /// Stream transports wait on this for the rendered response.
        respond_to: Option<SyncSender<Envelope>>,
    },
}

/// Appends request/response pairs as JSON lines.
#[derive(Clone)]
pub struct ExchangeLog {
    writer: Arc<Mutex<BufWriter<std::fs::File>>>,
}

impl ExchangeLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    /// Open `path` if given, logging and continuing without a log on failure.
    pub fn open_optional(path: Option<&Path>) -> Option<Self> {
        let path = path?;
        match Self::open(path) {
            Ok(log) => Some(log),
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "Failed to open exchange log");
                None
            }
        }
    }

    pub fn write_json(&self, value: &serde_json::Value) {
        if let Ok(mut guard) = self.writer.lock() {
            if serde_json::to_writer(&mut *guard, value).is_ok() {
                let _ = guard.write_all(b"\n");
                let _ = guard.flush();
            }
        }
    }

    pub fn request(&self, peer: &str, line: &str) {
        self.write_json(&serde_json::json!({
            "event": "request",
            "peer": peer,
            "line": line,
        }));
    }

    pub fn response(&self, peer: &str, envelope: &Envelope) {
        self.write_json(&serde_json::json!({
            "event": "response",
            "peer": peer,
            "status": if envelope.ok { "ok" } else { "error" },
            "command": envelope.command,
            "body": envelope.body,
        }));
    }
}
