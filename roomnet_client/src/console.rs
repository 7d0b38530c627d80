//! Line console for the client binary.
//!
//! Commands:
//!   connect [host] [port]  - Connect (defaults from config)
//!   disconnect             - Drop the connection
//!   status                 - Show session status
//!   nick <name>            - Set nickname
//!   rooms                  - Ask the server for open rooms
//!   create <room name>     - Create a room
//!   join <room id>         - Join a room
//!   leave                  - Leave the current room
//!   say <message>          - Chat in the current room
//!   ready                  - Toggle ready state
//!   start                  - Start the game (host only)
//!   input <h> <v>          - Send one movement input sample
//!   send <json>            - Send a raw line
//!   quit                   - Exit

use roomnet_shared::protocol::{ClientRequest, InputSample};
use tracing::{info, warn};

use crate::session::Session;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect {
        host: Option<String>,
        port: Option<u16>,
    },
    Disconnect,
    Status,
    Request(ClientRequest),
    Raw(String),
    Help,
    Quit,
}

pub const HELP: &str = "commands: connect [host] [port] | disconnect | status | nick <name> | rooms | \
create <name> | join <id> | leave | say <msg> | ready | start | input <h> <v> | send <json> | quit";

/// Parses one console line. Blank lines yield `Ok(None)`; bad arguments
/// yield a usage string.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let cmd = match head {
        "" => return Ok(None),
        "connect" => {
            let port = match args.get(1) {
                Some(p) => Some(
                    p.parse::<u16>()
                        .map_err(|_| "Usage: connect [host] [port]".to_string())?,
                ),
                None => None,
            };
            Command::Connect {
                host: args.first().map(|h| h.to_string()),
                port,
            }
        }
        "disconnect" => Command::Disconnect,
        "status" => Command::Status,
        "nick" if !rest.is_empty() => Command::Request(ClientRequest::SetNickname {
            nickname: rest.to_string(),
        }),
        "nick" => return Err("Usage: nick <name>".into()),
        "rooms" => Command::Request(ClientRequest::FindRooms),
        "create" if !rest.is_empty() => Command::Request(ClientRequest::CreateRoom {
            room_name: rest.to_string(),
        }),
        "create" => return Err("Usage: create <room name>".into()),
        "join" => {
            let room_id = args
                .first()
                .and_then(|id| id.parse::<i64>().ok())
                .ok_or_else(|| "Usage: join <room id>".to_string())?;
            Command::Request(ClientRequest::JoinRoom { room_id })
        }
        "leave" => Command::Request(ClientRequest::LeaveRoom),
        "say" if !rest.is_empty() => Command::Request(ClientRequest::ChatMessage {
            message: rest.to_string(),
        }),
        "say" => return Err("Usage: say <message>".into()),
        "ready" => Command::Request(ClientRequest::ToggleReady),
        "start" => Command::Request(ClientRequest::StartGame),
        "input" => {
            let axis = |i: usize| args.get(i).and_then(|a| a.parse::<f32>().ok());
            match (axis(0), axis(1)) {
                (Some(h), Some(v)) => Command::Request(ClientRequest::PlayerInput {
                    input: InputSample {
                        h,
                        v,
                        anim_forward: v,
                        anim_strafe: h,
                    },
                }),
                _ => return Err("Usage: input <h> <v>".into()),
            }
        }
        "send" if !rest.is_empty() => Command::Raw(rest.to_string()),
        "send" => return Err("Usage: send <json>".into()),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command '{other}'. {HELP}")),
    };
    Ok(Some(cmd))
}

/// Runs a command against the session and returns lines to print.
///
/// `Quit` is left to the caller.
pub async fn exec(session: &mut Session, cmd: Command) -> Vec<String> {
    match cmd {
        Command::Connect { host, port } => {
            let host = host.unwrap_or_else(|| session.config().host.clone());
            let port = port.unwrap_or(session.config().port);
            match session.connect(&host, port).await {
                Ok(peer) => vec![format!("Connected to {peer}")],
                Err(e) => vec![format!("Connect failed: {e}")],
            }
        }
        Command::Disconnect => {
            if session.disconnect() {
                vec!["Disconnected".to_string()]
            } else {
                vec!["Not connected".to_string()]
            }
        }
        Command::Status => {
            let mut out = vec![
                format!("State: {:?}", session.state()),
                format!("Local id: {}", session.local_id().unwrap_or("-")),
            ];
            if let Some(peer) = session.peer_addr() {
                out.push(format!("Server: {peer}"));
            }
            out.push(format!("Players: {}", session.roster().len()));
            for entity in session.roster().iter() {
                out.push(format!("  {} at {}", entity.id, entity.position));
            }
            out
        }
        Command::Request(req) => match session.send_request(&req).await {
            Ok(()) => Vec::new(),
            Err(e) => vec![format!("Send failed: {e}")],
        },
        Command::Raw(line) => match session.send(&line).await {
            Ok(()) => Vec::new(),
            Err(e) => vec![format!("Send failed: {e}")],
        },
        Command::Help => vec![HELP.to_string()],
        Command::Quit => Vec::new(),
    }
}

/// Sends `set_nickname` and returns lines to print. A failed send is
/// reported, never propagated, so the caller keeps running.
pub async fn announce(session: &mut Session, nickname: &str) -> Vec<String> {
    let req = ClientRequest::SetNickname {
        nickname: nickname.to_string(),
    };
    match session.send_request(&req).await {
        Ok(()) => {
            info!(%nickname, "Nickname sent");
            vec![format!("Nickname set to {nickname}")]
        }
        Err(e) => {
            warn!(error = %e, %nickname, "Nickname not sent");
            vec![format!("Nickname not sent: {e}")]
        }
    }
}
