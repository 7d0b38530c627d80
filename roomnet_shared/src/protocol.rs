//! Wire protocol.
//!
//! One UTF-8 JSON object per line in both directions. Every object carries a
//! string `type` field; the rest of the object is the type-specific payload.
//!
//! Decoding happens in two steps: [`Envelope::parse`] checks the line is a
//! JSON object with a `type` tag, then [`decode_line`] maps known tags onto
//! typed payloads. Tags this crate does not know about decode to
//! [`ServerMessage::Other`] so callers can forward them untouched.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::math::Vec3;

/// Name of the discriminant field present in every message.
pub const TYPE_FIELD: &str = "type";

/// Errors produced while decoding or encoding a line.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("line is not json: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("message is not a json object")]
    NotObject,
    #[error("message has no string `type` field")]
    MissingType,
    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A parsed message: its type tag plus the full JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: String,
    pub payload: Map<String, Value>,
}

impl Envelope {
    /// Parses one line into an envelope.
    ///
    /// Anything that does not start with `{` is rejected before reaching the
    /// JSON parser.
    pub fn parse(line: &str) -> Result<Self, CodecError> {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return Err(CodecError::NotObject);
        }
        let value: Value = serde_json::from_str(trimmed).map_err(CodecError::NotJson)?;
        let Value::Object(payload) = value else {
            return Err(CodecError::NotObject);
        };
        let kind = payload
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingType)?
            .to_string();
        Ok(Self { kind, payload })
    }

    /// Deserializes the payload into a typed body. Unknown fields are ignored.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|source| {
            CodecError::Payload {
                kind: self.kind.clone(),
                source,
            }
        })
    }
}

/// Player ids are strings on the wire, but numeric ids are accepted too.
fn player_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected player id, got {other}"
        ))),
    }
}

/// `assign_id`: the id the server gave this connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssignId {
    #[serde(deserialize_with = "player_id")]
    pub player_id: String,
}

/// One member listed in an `update_room_info` snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomMember {
    #[serde(deserialize_with = "player_id")]
    pub player_id: String,
    /// Servers that only track membership omit this; it then reads as the origin.
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub is_ready: bool,
}

/// `update_room_info`: full room membership plus room metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomUpdate {
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub host_id: String,
    pub players: Vec<RoomMember>,
}

/// `player_moved`: authoritative position of a single player.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerMoved {
    #[serde(deserialize_with = "player_id")]
    pub player_id: String,
    pub position: Vec3,
}

/// Animation parameters a remote player last reported.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimationIntent {
    #[serde(default)]
    pub forward: f32,
    #[serde(default)]
    pub strafe: f32,
}

/// One entry of a `game_state_update` tick.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerState {
    #[serde(deserialize_with = "player_id")]
    pub player_id: String,
    pub position: Vec3,
    #[serde(default)]
    pub animation: Option<AnimationIntent>,
}

/// `game_state_update`: per-tick positions of every player in the room.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameStateUpdate {
    pub players: Vec<PlayerState>,
}

/// `player_joined`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerJoined {
    #[serde(deserialize_with = "player_id")]
    pub player_id: String,
    #[serde(default)]
    pub position: Option<Vec3>,
}

/// `player_left`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerLeft {
    #[serde(deserialize_with = "player_id")]
    pub player_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomSummary {
    pub room_id: i64,
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub player_count: u32,
}

/// `find_rooms_response`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomList {
    #[serde(default)]
    pub rooms: Vec<RoomSummary>,
}

/// `chat_broadcast`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatBroadcast {
    pub sender_id: String,
    pub message: String,
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    AssignId(AssignId),
    UpdateRoomInfo(RoomUpdate),
    PlayerMoved(PlayerMoved),
    GameStateUpdate(GameStateUpdate),
    PlayerJoined(PlayerJoined),
    PlayerLeft(PlayerLeft),
    LeaveRoomSuccess,
    GameStart,
    FindRoomsResponse(RoomList),
    ChatBroadcast(ChatBroadcast),
    /// Well-formed envelope with a tag this crate does not interpret.
    Other(String),
}

/// Decodes one inbound line.
pub fn decode_line(line: &str) -> Result<ServerMessage, CodecError> {
    let env = Envelope::parse(line)?;
    let msg = match env.kind.as_str() {
        "assign_id" => ServerMessage::AssignId(env.decode()?),
        "update_room_info" => ServerMessage::UpdateRoomInfo(env.decode()?),
        "player_moved" => ServerMessage::PlayerMoved(env.decode()?),
        "game_state_update" => ServerMessage::GameStateUpdate(env.decode()?),
        "player_joined" => ServerMessage::PlayerJoined(env.decode()?),
        "player_left" => ServerMessage::PlayerLeft(env.decode()?),
        "leave_room_success" => ServerMessage::LeaveRoomSuccess,
        "game_start" => ServerMessage::GameStart,
        "find_rooms_response" => ServerMessage::FindRoomsResponse(env.decode()?),
        "chat_broadcast" => ServerMessage::ChatBroadcast(env.decode()?),
        _ => ServerMessage::Other(env.kind),
    };
    Ok(msg)
}

/// Input sample sent with `player_input`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputSample {
    pub h: f32,
    pub v: f32,
    pub anim_forward: f32,
    pub anim_strafe: f32,
}

/// Client → server requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    SetNickname { nickname: String },
    CreateRoom { room_name: String },
    FindRooms,
    JoinRoom { room_id: i64 },
    LeaveRoom,
    ChatMessage { message: String },
    ToggleReady,
    StartGame,
    PlayerInput { input: InputSample },
}

/// Encodes a request as a single line, without the terminator.
pub fn encode_request(req: &ClientRequest) -> Result<String, CodecError> {
    serde_json::to_string(req).map_err(CodecError::Encode)
}
