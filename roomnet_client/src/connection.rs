//! Connection to the game server.
//!
//! One TCP stream, split in two: the read half is moved into a background
//! task that turns the byte stream into lines and pushes them onto an
//! unbounded queue; the write half stays here for synchronous, flushed sends
//! from the consumer context.
//!
//! The read task owns nothing but its socket half and the queue sender. When
//! it stops, for whatever reason, its last act is to push exactly one
//! [`Inbound::Closed`] marker. Every queue item carries the epoch of the
//! connection it was read on, so a consumer can tell items of a torn-down
//! connection from those of a newer one.

use std::{net::SocketAddr, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    net::{lookup_host, tcp::OwnedWriteHalf, TcpStream},
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time,
};
use tracing::{debug, info, warn};

use crate::error::{ConnectError, SendError};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// TCP handshake in progress.
    Connecting,
    Connected,
}

/// Item moved from the read task to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One non-empty line, terminator stripped.
    Line { epoch: u64, text: String },
    /// The read task for `epoch` has stopped.
    Closed { epoch: u64 },
}

impl Inbound {
    pub fn epoch(&self) -> u64 {
        match self {
            Inbound::Line { epoch, .. } | Inbound::Closed { epoch } => *epoch,
        }
    }
}

/// Owner of the server socket and of the inbound queue.
#[derive(Debug)]
pub struct Connection {
    state: ConnectionState,
    /// Incremented on every successful connect.
    epoch: u64,
    connect_timeout: Duration,
    peer: Option<SocketAddr>,
    writer: Option<OwnedWriteHalf>,
    shutdown: Option<oneshot::Sender<()>>,
    reader: Option<JoinHandle<()>>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
}

impl Connection {
    pub fn new(connect_timeout: Duration) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            state: ConnectionState::Disconnected,
            epoch: 0,
            connect_timeout,
            peer: None,
            writer: None,
            shutdown: None,
            reader: None,
            inbound_tx,
            inbound_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Epoch of the most recent connection (0 before the first one).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True when items tagged with `epoch` belong to the live connection.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.state == ConnectionState::Connected && self.epoch == epoch
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// True while a read task spawned by this connection is still running.
    pub fn reader_running(&self) -> bool {
        self.reader.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Opens the TCP stream and starts the read task.
    ///
    /// Fails with [`ConnectError::AlreadyConnected`] unless disconnected; the
    /// existing connection is left untouched in that case. On any other
    /// failure the state is back to `Disconnected` and no task was spawned.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr, ConnectError> {
        if self.state != ConnectionState::Disconnected {
            return Err(ConnectError::AlreadyConnected);
        }
        self.state = ConnectionState::Connecting;
        let addr = format!("{host}:{port}");
        info!(server = %addr, "Connecting to server");

        let opened = match time::timeout(self.connect_timeout, open(host, port, &addr)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout {
                addr: addr.clone(),
                after: self.connect_timeout,
            }),
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(server = %addr, error = %e, "Connect failed");
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let peer = stream.peer_addr().map_err(|source| ConnectError::Io {
            addr: addr.clone(),
            source,
        });
        let peer = match peer {
            Ok(peer) => peer,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let (read_half, write_half) = stream.into_split();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.epoch += 1;
        self.reader = Some(tokio::spawn(read_loop(
            read_half,
            self.inbound_tx.clone(),
            shutdown_rx,
            self.epoch,
        )));
        self.shutdown = Some(shutdown_tx);
        self.writer = Some(write_half);
        self.peer = Some(peer);
        self.state = ConnectionState::Connected;

        info!(server = %peer, epoch = self.epoch, "Connected to server");
        Ok(peer)
    }

    /// Tears the connection down without waiting for the read task.
    ///
    /// Returns false if there was nothing to close.
    pub fn close(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        if let Some(shutdown) = self.shutdown.take() {
            if shutdown.send(()).is_err() {
                debug!(epoch = self.epoch, "Read task already stopped");
            }
        }
        // Dropping the write half shuts down our side of the stream; the read
        // half goes away when the task observes the shutdown signal.
        self.writer = None;
        self.reader = None;
        self.peer = None;
        self.state = ConnectionState::Disconnected;
        info!(epoch = self.epoch, "Connection closed");
        true
    }

    /// Writes `line` plus a terminator and flushes.
    pub async fn send_line(&mut self, line: &str) -> Result<(), SendError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.contains('\n') {
            return Err(SendError::MultiLine);
        }
        let writer = match (self.state, self.writer.as_mut()) {
            (ConnectionState::Connected, Some(writer)) => writer,
            _ => return Err(SendError::NotConnected),
        };

        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Pops the next queued item without waiting.
    pub fn try_recv(&mut self) -> Option<Inbound> {
        self.inbound_rx.try_recv().ok()
    }
}

async fn open(host: &str, port: u16, addr: &str) -> Result<TcpStream, ConnectError> {
    let candidates: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| ConnectError::Resolve {
            addr: addr.to_string(),
            source,
        })?
        .collect();
    if candidates.is_empty() {
        return Err(ConnectError::NoAddress(addr.to_string()));
    }

    let stream = TcpStream::connect(&candidates[..])
        .await
        .map_err(|source| ConnectError::Io {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true).map_err(|source| ConnectError::Io {
        addr: addr.to_string(),
        source,
    })?;
    Ok(stream)
}

/// Reads lines until end of stream, a read error, or the shutdown signal,
/// then pushes one [`Inbound::Closed`].
///
/// Blank lines are skipped. Invalid UTF-8 is replaced rather than treated as
/// a transport error, so one bad line never ends the connection.
pub(crate) async fn read_loop<R>(
    reader: R,
    tx: mpsc::UnboundedSender<Inbound>,
    mut shutdown: oneshot::Receiver<()>,
    epoch: u64,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(1024);

    loop {
        buf.clear();
        tokio::select! {
            _ = &mut shutdown => {
                debug!(epoch, "Read loop shut down");
                break;
            }
            read = reader.read_until(b'\n', &mut buf) => match read {
                Ok(0) => {
                    info!(epoch, "Server closed the connection");
                    break;
                }
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    if buf.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(Inbound::Line { epoch, text }).is_err() {
                        debug!(epoch, "Inbound queue dropped");
                        break;
                    }
                }
                Err(e) => {
                    warn!(epoch, error = %e, "Read failed");
                    break;
                }
            }
        }
    }

    let _ = tx.send(Inbound::Closed { epoch });
}
