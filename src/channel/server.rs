//! Stream transports: one controller at a time over TCP or a Unix socket.

use super::protocol::{self, Envelope, MAX_LINE_BYTES};
use super::{ChannelMsg, CommandChannel, ExchangeLog, CHANNEL_CAPACITY};
use anyhow::Result;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
#[cfg(unix)]
use std::{
    os::unix::{fs::FileTypeExt, net::UnixListener},
    os::unix::{net::SocketAddr as UnixSocketAddr, net::UnixStream},
    path::PathBuf,
};

/// Longest time a connection waits for the main loop to answer one request.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Main-loop end of a stream transport.
pub struct SocketChannel {
    rx: Receiver<ChannelMsg>,
    pending: Option<SyncSender<Envelope>>,
    /// Bound address or socket path, for logging.
    pub endpoint: String,
    #[allow(dead_code)]
    join: thread::JoinHandle<()>,
}

impl SocketChannel {
    pub fn start(addr: SocketAddr, log: Option<ExchangeLog>) -> Result<Self> {
        let (to_loop_tx, to_loop_rx) = mpsc::sync_channel::<ChannelMsg>(CHANNEL_CAPACITY);

        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(false)?;
        let endpoint = listener.local_addr()?.to_string();

        let controller_active = Arc::new(AtomicBool::new(false));
        let label = endpoint.clone();
        let join = thread::spawn(move || {
            tracing::info!(addr = %label, "Command server listening");
            loop {
                let (stream, peer) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::warn!(%err, "Command server accept failed");
                        continue;
                    }
                };

                let log = log.clone();
                let controller_active = Arc::clone(&controller_active);
                let to_loop_tx = to_loop_tx.clone();
                thread::spawn(move || {
                    handle_connection(stream, peer.to_string(), log, controller_active, to_loop_tx);
                });
            }
        });

        Ok(Self {
            rx: to_loop_rx,
            pending: None,
            endpoint,
            join,
        })
    }

    #[cfg(unix)]
    pub fn start_uds(path: PathBuf, log: Option<ExchangeLog>) -> Result<Self> {
        let (to_loop_tx, to_loop_rx) = mpsc::sync_channel::<ChannelMsg>(CHANNEL_CAPACITY);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        if path.exists() {
            let meta = std::fs::metadata(&path)?;
            if meta.file_type().is_socket() {
                std::fs::remove_file(&path)?;
            } else {
                anyhow::bail!("--uds path exists and is not a socket: {}", path.display());
            }
        }

        let listener = UnixListener::bind(&path)?;
        let endpoint = path.display().to_string();

        let controller_active = Arc::new(AtomicBool::new(false));
        let join = thread::spawn(move || {
            tracing::info!(path = %path.display(), "Command server listening (uds)");
            loop {
                let (stream, peer) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(err) => {
                        tracing::warn!(%err, "Command server accept failed");
                        continue;
                    }
                };

                let peer_label = peer_label_uds(&peer);
                let log = log.clone();
                let controller_active = Arc::clone(&controller_active);
                let to_loop_tx = to_loop_tx.clone();
                thread::spawn(move || {
                    handle_connection(stream, peer_label, log, controller_active, to_loop_tx);
                });
            }
        });

        Ok(Self {
            rx: to_loop_rx,
            pending: None,
            endpoint,
            join,
        })
    }
}

impl CommandChannel for SocketChannel {
    fn receive(&mut self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(ChannelMsg::Connected { peer }) => {
                    tracing::info!(%peer, "Controller connected");
                }
                Ok(ChannelMsg::Disconnected { peer }) => {
                    tracing::info!(%peer, "Controller disconnected");
                    self.pending = None;
                }
                Ok(ChannelMsg::Line { line, respond_to }) => {
                    self.pending = respond_to;
                    return Some(line);
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(remaining);
                    return None;
                }
            }
        }
    }

    fn send(&mut self, envelope: &Envelope) -> Result<()> {
        match self.pending.take() {
            Some(tx) => {
                if tx.send(envelope.clone()).is_err() {
                    tracing::debug!(command = %envelope.command, "Controller went away before the response");
                }
            }
            None => {
                tracing::debug!(command = %envelope.command, "No controller waiting; response dropped");
            }
        }
        Ok(())
    }
}

trait ControlStream: Read + Write + Send + 'static {
    fn try_clone(&self) -> std::io::Result<Self>
    where
        Self: Sized;
    fn shutdown(&self, how: Shutdown) -> std::io::Result<()>;
}

impl ControlStream for TcpStream {
    fn try_clone(&self) -> std::io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self, how: Shutdown) -> std::io::Result<()> {
        TcpStream::shutdown(self, how)
    }
}

#[cfg(unix)]
impl ControlStream for UnixStream {
    fn try_clone(&self) -> std::io::Result<Self> {
        UnixStream::try_clone(self)
    }

    fn shutdown(&self, how: Shutdown) -> std::io::Result<()> {
        UnixStream::shutdown(self, how)
    }
}

#[cfg(unix)]
fn peer_label_uds(peer: &UnixSocketAddr) -> String {
    peer.as_pathname()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| format!("{peer:?}"))
}

/// First token of a request, lowercased, for envelopes the main loop never saw.
fn verb_label(line: &str) -> String {
    line.split_whitespace()
        .next()
        .unwrap_or("request")
        .to_ascii_lowercase()
}

fn handle_connection<S: ControlStream>(
    mut stream: S,
    peer: String,
    log: Option<ExchangeLog>,
    controller_active: Arc<AtomicBool>,
    to_loop: SyncSender<ChannelMsg>,
) {
    let claimed = controller_active
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok();

    if !claimed {
        tracing::info!(%peer, "Rejecting second controller");
        let mut writer = BufWriter::new(&mut stream);
        let _ = write_envelope_logged(
            &mut writer,
            &Envelope::error("connect", "busy"),
            log.as_ref(),
            &peer,
        );
        drop(writer);
        let _ = stream.shutdown(Shutdown::Both);
        return;
    }

    if let Some(log) = &log {
        log.write_json(&serde_json::json!({"event":"connect","peer":peer.as_str()}));
    }
    let _ = to_loop.send(ChannelMsg::Connected { peer: peer.clone() });

    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(%err, "Failed to clone controller stream");
            controller_active.store(false, Ordering::SeqCst);
            return;
        }
    });
    let mut writer = BufWriter::new(stream);

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(n) if n > MAX_LINE_BYTES => {
                tracing::warn!(%peer, bytes = n, "Request line too large");
                let _ = write_envelope_logged(
                    &mut writer,
                    &Envelope::error("request", "line_too_large"),
                    log.as_ref(),
                    &peer,
                );
                break;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(%err, %peer, "Controller read failed");
                break;
            }
        }

        let Some(request) = protocol::normalize_line(&line) else {
            continue;
        };
        if let Some(log) = &log {
            log.request(&peer, &request);
        }

        let verb = verb_label(&request);
        let (resp_tx, resp_rx) = mpsc::sync_channel(1);
        match to_loop.try_send(ChannelMsg::Line {
            line: request,
            respond_to: Some(resp_tx),
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let _ = write_envelope_logged(
                    &mut writer,
                    &Envelope::error(verb, "server_busy"),
                    log.as_ref(),
                    &peer,
                );
                continue;
            }
            Err(TrySendError::Disconnected(_)) => break,
        }

        let envelope = match resp_rx.recv_timeout(RESPONSE_TIMEOUT) {
            Ok(envelope) => envelope,
            Err(_) => Envelope::error(verb, "response_timeout"),
        };
        if write_envelope_logged(&mut writer, &envelope, log.as_ref(), &peer).is_err() {
            break;
        }
    }

    if let Some(log) = &log {
        log.write_json(&serde_json::json!({"event":"disconnect","peer":peer.as_str()}));
    }
    let _ = to_loop.send(ChannelMsg::Disconnected { peer });

    controller_active.store(false, Ordering::SeqCst);
}

fn write_envelope_logged<W: Write>(
    writer: &mut W,
    envelope: &Envelope,
    log: Option<&ExchangeLog>,
    peer: &str,
) -> Result<()> {
    if let Some(log) = log {
        log.response(peer, envelope);
    }
    writer.write_all(envelope.render_terminated().as_bytes())?;
    writer.flush()?;
    Ok(())
}
