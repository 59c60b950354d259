//! File/FIFO transport: requests are followed like `tail -f`, responses overwrite a file.

use super::protocol::{Envelope, LineBuffer};
use super::{ChannelMsg, CommandChannel, ExchangeLog, CHANNEL_CAPACITY};
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

const PEER: &str = "pipe";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct PipeChannel {
    rx: Receiver<ChannelMsg>,
    output: PathBuf,
    log: Option<ExchangeLog>,
}

impl PipeChannel {
    /// Open `input` for reading (creating it when missing) and start the reader thread.
    ///
    /// A pre-existing regular file is truncated so stale requests are not replayed.
    pub fn open(input: &Path, output: &Path, log: Option<ExchangeLog>) -> Result<Self> {
        let file = open_input(input)
            .with_context(|| format!("failed to open request path {}", input.display()))?;
        let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let input_label = input.display().to_string();
        // Detached: the reader sits in a blocking `read` for the life of the process.
        thread::Builder::new()
            .name("pipe-reader".into())
            .spawn(move || {
                tracing::info!(path = %input_label, "Following request pipe");
                read_loop(file, tx);
            })
            .context("failed to spawn pipe reader")?;

        Ok(Self {
            rx,
            output: output.to_path_buf(),
            log,
        })
    }
}

/// Overwrite `path` with a rendered envelope.
pub fn write_envelope(path: &Path, envelope: &Envelope) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, envelope.render())
        .with_context(|| format!("failed to write response file {}", path.display()))
}

impl CommandChannel for PipeChannel {
    fn receive(&mut self, timeout: Duration) -> Option<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(ChannelMsg::Line { line, .. }) => {
                if let Some(log) = &self.log {
                    log.request(PEER, &line);
                }
                Some(line)
            }
            Ok(ChannelMsg::Connected { .. } | ChannelMsg::Disconnected { .. }) => None,
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                None
            }
        }
    }

    fn send(&mut self, envelope: &Envelope) -> Result<()> {
        if let Some(log) = &self.log {
            log.response(PEER, envelope);
        }
        write_envelope(&self.output, envelope)
    }
}

fn open_input(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    // Read-write keeps a FIFO from reporting EOF between controller writes.
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    if file.metadata()?.is_file() {
        file.set_len(0)?;
    }
    Ok(file)
}

fn read_loop(mut file: File, tx: SyncSender<ChannelMsg>) {
    let mut buffer = LineBuffer::default();
    let mut chunk = [0u8; 4096];
    let mut position: u64 = 0;
    loop {
        match file.read(&mut chunk) {
            Ok(0) => {
                // The controller may have truncated or rewritten the file.
                if let Ok(meta) = file.metadata() {
                    if meta.is_file() && meta.len() < position {
                        if file.seek(SeekFrom::Start(0)).is_ok() {
                            position = 0;
                        }
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }
            Ok(n) => {
                position += n as u64;
                buffer.push(&chunk[..n]);
                while let Some(line) = buffer.next_line() {
                    let msg = ChannelMsg::Line {
                        line,
                        respond_to: None,
                    };
                    if tx.send(msg).is_err() {
                        return;
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                tracing::warn!(%err, "Request pipe read failed");
                return;
            }
        }
    }
}
