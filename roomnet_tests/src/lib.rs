//! Test fixtures: a scripted line server and helpers for driving a
//! [`Session`] from a test.
//!
//! The stub server speaks the same newline-delimited JSON protocol as the
//! real room server but does nothing on its own; each test scripts exactly
//! which lines are sent and when the socket is closed.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use roomnet_client::Session;
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener,
    },
    time,
};
use tracing::debug;

/// Default wait used by the helpers below.
pub const WAIT: Duration = Duration::from_secs(3);

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Listener bound to an ephemeral loopback port.
pub struct StubServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl StubServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind stub server")?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Waits for the next client.
    pub async fn accept(&self) -> anyhow::Result<StubPeer> {
        let (stream, peer) = time::timeout(WAIT, self.listener.accept())
            .await
            .context("accept timed out")?
            .context("accept")?;
        debug!(%peer, "Stub server accepted client");
        let (read, write) = stream.into_split();
        Ok(StubPeer {
            lines: BufReader::new(read).lines(),
            writer: write,
        })
    }
}

/// Server side of one accepted client.
pub struct StubPeer {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl StubPeer {
    /// Writes `line` followed by a newline.
    pub async fn send_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn send_json(&mut self, value: &Value) -> anyhow::Result<()> {
        self.send_line(&value.to_string()).await
    }

    /// Next line from the client, or `None` once it closed the stream.
    pub async fn recv_line(&mut self) -> anyhow::Result<Option<String>> {
        let line = time::timeout(WAIT, self.lines.next_line())
            .await
            .context("recv timed out")??;
        Ok(line)
    }

    /// Closes both directions of the socket.
    pub fn close(self) {
        drop(self);
    }
}

/// Pumps `session` until `done` holds or [`WAIT`] elapses. Returns whether
/// the condition was met.
pub async fn pump_until<F>(session: &mut Session, mut done: F) -> bool
where
    F: FnMut(&Session) -> bool,
{
    let deadline = time::Instant::now() + WAIT;
    loop {
        session.pump();
        if done(session) {
            return true;
        }
        if time::Instant::now() >= deadline {
            return false;
        }
        time::sleep(Duration::from_millis(5)).await;
    }
}

/// Pumps `session` for a fixed duration.
pub async fn pump_for(session: &mut Session, duration: Duration) {
    let deadline = time::Instant::now() + duration;
    while time::Instant::now() < deadline {
        session.pump();
        time::sleep(Duration::from_millis(5)).await;
    }
    session.pump();
}

/// `{"x":x,"y":y,"z":z}`.
pub fn pos(x: f32, y: f32, z: f32) -> Value {
    serde_json::json!({ "x": x, "y": y, "z": z })
}

/// An `update_room_info` line listing `players` as `(id, position)`.
pub fn room_update(room_name: &str, host_id: &str, players: &[(&str, Value)]) -> Value {
    let players: Vec<Value> = players
        .iter()
        .map(|(id, position)| serde_json::json!({ "player_id": id, "position": position }))
        .collect();
    serde_json::json!({
        "type": "update_room_info",
        "room_name": room_name,
        "host_id": host_id,
        "players": players,
    })
}
