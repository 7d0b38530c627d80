//! Room session.
//!
//! [`Session`] is the explicitly owned service the rest of the client talks
//! to. It owns the [`Connection`], the [`Roster`], the local player id and
//! the observer list, and it must be driven from a single consumer context:
//! call [`Session::pump`] once per tick to drain everything the read task
//! has queued since the previous tick.
//!
//! Routing of inbound lines:
//!
//! | type                 | roster effect              | forwarded |
//! |----------------------|----------------------------|-----------|
//! | `assign_id`          | sets the local id          | no        |
//! | `update_room_info`   | snapshot diff              | yes       |
//! | `player_moved`       | move                       | no        |
//! | `game_state_update`  | one move per listed player | yes       |
//! | `player_joined`      | add, if a position is sent | yes       |
//! | `player_left`        | remove                     | yes       |
//! | `leave_room_success` | clear                      | yes       |
//! | anything else        | none                       | yes       |
//!
//! Lines that are not JSON envelopes, or whose payload does not match the
//! expected shape, are forwarded verbatim and change nothing.

use std::net::SocketAddr;

use roomnet_shared::{
    config::ClientConfig,
    event::{Notifier, ObserverId, SessionEvent},
    protocol::{self, ClientRequest, ServerMessage},
};
use tracing::{debug, info, warn};

use crate::{
    bridge::PresentationBridge,
    connection::{Connection, ConnectionState, Inbound},
    error::{ConnectError, SendError},
    roster::Roster,
};

/// Client-side session with one game server.
#[derive(Debug)]
pub struct Session {
    config: ClientConfig,
    connection: Connection,
    roster: Roster,
    notifier: Notifier,
    local_id: Option<String>,
}

impl Session {
    pub fn new(config: ClientConfig, bridge: impl PresentationBridge + Send + 'static) -> Self {
        let connection = Connection::new(config.connect_timeout());
        Self {
            config,
            connection,
            roster: Roster::new(bridge),
            notifier: Notifier::new(),
            local_id: None,
        }
    }

    /// Registers an observer for [`SessionEvent`]s.
    pub fn subscribe<F>(&mut self, f: F) -> ObserverId
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        self.notifier.subscribe(f)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.state() == ConnectionState::Connected
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.connection.peer_addr()
    }

    /// Id the server assigned to this connection, once `assign_id` arrived.
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Connects to `host:port`.
    ///
    /// Emits `Connected` on success and `ConnectionFailed` on transport
    /// failure. A call while already connected is rejected with
    /// [`ConnectError::AlreadyConnected`] and emits nothing.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr, ConnectError> {
        match self.connection.connect(host, port).await {
            Ok(peer) => {
                self.notifier.emit(&SessionEvent::Connected);
                Ok(peer)
            }
            Err(ConnectError::AlreadyConnected) => {
                warn!("Connect ignored: already connected");
                Err(ConnectError::AlreadyConnected)
            }
            Err(e) => {
                self.notifier
                    .emit(&SessionEvent::ConnectionFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Connects to the host and port from the config.
    pub async fn connect_configured(&mut self) -> Result<SocketAddr, ConnectError> {
        let host = self.config.host.clone();
        let port = self.config.port;
        self.connect(&host, port).await
    }

    /// Drops the connection.
    ///
    /// The roster is cleared before the socket is closed, so presentation
    /// cleanup always sees a live transport. Emits `Disconnected` once per
    /// connection; returns false and does nothing when already disconnected.
    pub fn disconnect(&mut self) -> bool {
        if self.connection.state() == ConnectionState::Disconnected {
            return false;
        }
        self.roster.clear_all();
        self.connection.close();
        self.local_id = None;
        info!("Disconnected from server");
        self.notifier.emit(&SessionEvent::Disconnected);
        true
    }

    /// Sends one raw line.
    ///
    /// A write failure disconnects the session before the error is returned.
    pub async fn send(&mut self, line: &str) -> Result<(), SendError> {
        match self.connection.send_line(line).await {
            Err(SendError::Io(e)) => {
                warn!(error = %e, "Send failed, dropping connection");
                self.disconnect();
                Err(SendError::Io(e))
            }
            other => other,
        }
    }

    /// Encodes and sends a typed request.
    pub async fn send_request(&mut self, req: &ClientRequest) -> Result<(), SendError> {
        let line = protocol::encode_request(req)?;
        self.send(&line).await
    }

    /// Drains the inbound queue in arrival order. Returns the number of items
    /// taken off the queue, including ones that were discarded.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(item) = self.connection.try_recv() {
            handled += 1;
            match item {
                Inbound::Closed { epoch } if self.connection.is_current(epoch) => {
                    info!(epoch, "Read loop ended");
                    self.disconnect();
                }
                Inbound::Line { epoch, text } if self.connection.is_current(epoch) => {
                    self.dispatch_line(text);
                }
                stale => {
                    debug!(epoch = stale.epoch(), "Dropping item from a closed connection");
                }
            }
        }
        handled
    }

    fn dispatch_line(&mut self, text: String) {
        let msg = match protocol::decode_line(&text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "Forwarding undecoded line");
                self.forward(text);
                return;
            }
        };

        match msg {
            ServerMessage::AssignId(assign) => {
                if let Some(current) = &self.local_id {
                    if *current != assign.player_id {
                        warn!(current = %current, ignored = %assign.player_id, "Local id already assigned");
                    }
                } else {
                    info!(player_id = %assign.player_id, "Assigned local player id");
                    self.local_id = Some(assign.player_id);
                }
            }
            ServerMessage::UpdateRoomInfo(update) => {
                self.roster.apply_snapshot(
                    update
                        .players
                        .into_iter()
                        .map(|member| (member.player_id, member.position)),
                );
                self.forward(text);
            }
            ServerMessage::PlayerMoved(moved) => {
                self.roster.apply_move(&moved.player_id, moved.position, None);
            }
            ServerMessage::GameStateUpdate(state) => {
                for player in state.players {
                    self.roster
                        .apply_move(&player.player_id, player.position, player.animation);
                }
                self.forward(text);
            }
            ServerMessage::PlayerJoined(joined) => {
                if let Some(position) = joined.position {
                    self.roster.apply_join(&joined.player_id, position);
                }
                self.forward(text);
            }
            ServerMessage::PlayerLeft(left) => {
                self.roster.apply_leave(&left.player_id);
                self.forward(text);
            }
            ServerMessage::LeaveRoomSuccess => {
                self.roster.clear_all();
                self.forward(text);
            }
            ServerMessage::GameStart
            | ServerMessage::FindRoomsResponse(_)
            | ServerMessage::ChatBroadcast(_)
            | ServerMessage::Other(_) => self.forward(text),
        }
    }

    fn forward(&mut self, text: String) {
        self.notifier.emit(&SessionEvent::MessageReceived(text));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use roomnet_shared::math::Vec3;

    use super::*;
    use crate::bridge::{BridgeCall, RecordingBridge};

    fn session() -> (Session, RecordingBridge, Arc<Mutex<Vec<SessionEvent>>>) {
        let bridge = RecordingBridge::new();
        let mut s = Session::new(ClientConfig::default(), bridge.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        s.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        (s, bridge, events)
    }

    fn forwarded(events: &Mutex<Vec<SessionEvent>>) -> Vec<String> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SessionEvent::MessageReceived(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    const SNAPSHOT_AB: &str = r#"{"type":"update_room_info","room_name":"r","host_id":"A","players":[{"player_id":"A","position":{"x":0,"y":0,"z":0}},{"player_id":"B","position":{"x":1,"y":0,"z":0}}]}"#;

    #[test]
    fn assign_id_is_consumed_silently() {
        let (mut s, _, events) = session();
        s.dispatch_line(r#"{"type":"assign_id","player_id":"UID7"}"#.into());
        assert_eq!(s.local_id(), Some("UID7"));
        assert!(events.lock().unwrap().is_empty());

        s.dispatch_line(r#"{"type":"assign_id","player_id":"UID8"}"#.into());
        assert_eq!(s.local_id(), Some("UID7"));
    }

    #[test]
    fn snapshot_updates_roster_and_is_forwarded() {
        let (mut s, bridge, events) = session();
        s.dispatch_line(SNAPSHOT_AB.into());
        assert_eq!(s.roster().ids().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(bridge.calls().len(), 2);
        assert_eq!(forwarded(&events), vec![SNAPSHOT_AB.to_string()]);
    }

    #[test]
    fn move_after_snapshot_sees_new_entity() {
        let (mut s, bridge, events) = session();
        s.dispatch_line(SNAPSHOT_AB.into());
        bridge.take();
        s.dispatch_line(
            r#"{"type":"player_moved","player_id":"B","position":{"x":4,"y":0,"z":1}}"#.into(),
        );
        assert_eq!(
            bridge.calls(),
            vec![BridgeCall::Moved("B".into(), Vec3::new(4.0, 0.0, 1.0))]
        );
        assert_eq!(forwarded(&events).len(), 1);
    }

    #[test]
    fn move_before_any_snapshot_creates_nothing() {
        let (mut s, bridge, events) = session();
        s.dispatch_line(
            r#"{"type":"player_moved","player_id":"A","position":{"x":5,"y":0,"z":0}}"#.into(),
        );
        assert!(s.roster().is_empty());
        assert!(bridge.calls().is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_forwarded_verbatim() {
        let (mut s, bridge, events) = session();
        s.dispatch_line(SNAPSHOT_AB.into());
        bridge.take();

        s.dispatch_line("not json".into());
        s.dispatch_line(r#"{"type":"player_moved","player_id":"A"}"#.into());
        assert_eq!(
            forwarded(&events)[1..],
            [
                "not json".to_string(),
                r#"{"type":"player_moved","player_id":"A"}"#.to_string()
            ]
        );
        assert_eq!(s.roster().len(), 2);
        assert!(bridge.calls().is_empty());
    }

    #[test]
    fn game_state_update_moves_known_players_only() {
        let (mut s, bridge, events) = session();
        s.dispatch_line(SNAPSHOT_AB.into());
        bridge.take();

        let line = r#"{"type":"game_state_update","players":[{"player_id":"A","position":{"x":2,"y":0,"z":0},"animation":{"forward":1,"strafe":0}},{"player_id":"Z","position":{"x":9,"y":9,"z":9}}]}"#;
        s.dispatch_line(line.into());
        assert_eq!(
            bridge.calls(),
            vec![BridgeCall::Moved("A".into(), Vec3::new(2.0, 0.0, 0.0))]
        );
        assert_eq!(s.roster().get("A").unwrap().animation.unwrap().forward, 1.0);
        assert!(!s.roster().contains("Z"));
        assert_eq!(forwarded(&events), vec![SNAPSHOT_AB.to_string(), line.to_string()]);
    }

    #[test]
    fn leave_room_success_clears_and_forwards() {
        let (mut s, bridge, events) = session();
        s.dispatch_line(SNAPSHOT_AB.into());
        bridge.take();

        s.dispatch_line(r#"{"type":"leave_room_success"}"#.into());
        assert!(s.roster().is_empty());
        assert_eq!(bridge.calls().last(), Some(&BridgeCall::Cleared));
        assert_eq!(
            forwarded(&events).last().map(String::as_str),
            Some(r#"{"type":"leave_room_success"}"#)
        );
    }

    #[test]
    fn join_and_leave_signals() {
        let (mut s, _, events) = session();
        s.dispatch_line(r#"{"type":"player_joined","player_id":"N"}"#.into());
        assert!(s.roster().is_empty());

        s.dispatch_line(
            r#"{"type":"player_joined","player_id":"N","position":{"x":1,"y":2,"z":3}}"#.into(),
        );
        assert_eq!(
            s.roster().get("N").unwrap().position,
            Vec3::new(1.0, 2.0, 3.0)
        );

        s.dispatch_line(r#"{"type":"player_left","player_id":"N"}"#.into());
        assert!(s.roster().is_empty());
        assert_eq!(forwarded(&events).len(), 3);
    }

    #[test]
    fn other_types_are_forwarded() {
        let (mut s, _, events) = session();
        for line in [
            r#"{"type":"game_start"}"#,
            r#"{"type":"chat_broadcast","sender_id":"kim","message":"hi"}"#,
            r#"{"type":"find_rooms_response","rooms":[]}"#,
            r#"{"type":"something_new","x":1}"#,
        ] {
            s.dispatch_line(line.into());
        }
        assert_eq!(forwarded(&events).len(), 4);
    }

    #[test]
    fn disconnect_while_disconnected_is_noop() {
        let (mut s, bridge, events) = session();
        assert!(!s.disconnect());
        assert!(events.lock().unwrap().is_empty());
        assert!(bridge.calls().is_empty());
    }

    #[test]
    fn pump_on_idle_session_handles_nothing() {
        let (mut s, _, _) = session();
        assert_eq!(s.pump(), 0);
    }

    #[tokio::test]
    async fn send_while_disconnected_fails_locally() {
        let (mut s, _, events) = session();
        let err = s.send_request(&ClientRequest::FindRooms).await.unwrap_err();
        assert!(matches!(err, SendError::NotConnected));
        assert!(events.lock().unwrap().is_empty());
    }
}
