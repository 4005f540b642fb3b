//! JSON payload schema carried inside frames.
//!
//! Outbound: [`Handshake`] (opcode Handshake) and [`Request`] (opcode
//! Frame). Inbound: [`IncomingMessage`] (opcode Frame), interpreted into a
//! [`Dispatch`], and [`CloseReason`] (opcode Close).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Activity, ProtocolError};

/// Protocol version sent in the handshake.
pub const RPC_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A participant as described by the peer.
///
/// Only ever produced by the peer (READY and join requests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Snowflake id in decimal string form.
    #[serde(rename = "id")]
    pub user_id: String,
    pub username: String,
    /// Four-digit tag; missing for accounts without one.
    #[serde(default)]
    pub discriminator: String,
    /// Avatar hash, absent when the user has no avatar.
    #[serde(rename = "avatar", default)]
    pub avatar_hash: Option<String>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.discriminator.is_empty() || self.discriminator == "0" {
            write!(f, "{} ({})", self.username, self.user_id)
        } else {
            write!(f, "{}#{} ({})", self.username, self.discriminator, self.user_id)
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// First frame of every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub v: u32,
    pub client_id: String,
}

impl Handshake {
    /// A handshake for `client_id` at the current [`RPC_VERSION`].
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: RPC_VERSION,
            client_id: client_id.into(),
        }
    }
}

/// Events a client can subscribe to after READY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subscription {
    ActivityJoin,
    ActivitySpectate,
    ActivityJoinRequest,
}

impl Subscription {
    /// Every subscription the session registers on connect.
    pub const ALL: [Self; 3] = [
        Self::ActivityJoin,
        Self::ActivitySpectate,
        Self::ActivityJoinRequest,
    ];
}

/// `args` of `SET_ACTIVITY`. A missing `activity` clears the presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActivityArgs {
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
}

/// `args` of the join-request replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserArgs {
    pub user_id: String,
}

/// The command part of a [`Request`], tagged by `cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcCommand {
    SetActivity { args: SetActivityArgs },
    Subscribe { evt: Subscription },
    SendActivityJoinInvite { args: UserArgs },
    CloseActivityRequest { args: UserArgs },
}

/// How to answer a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Invite the requester.
    Yes,
    /// Decline the request.
    No,
    /// Dismiss the request without answering.
    Ignore,
}

impl RpcCommand {
    /// `SET_ACTIVITY` for this process; `None` clears the presence.
    pub fn set_activity(activity: Option<Activity>) -> Self {
        Self::SetActivity {
            args: SetActivityArgs {
                pid: std::process::id(),
                activity,
            },
        }
    }

    /// The command answering a join request from `user_id`.
    pub fn reply(user_id: impl Into<String>, reply: Reply) -> Self {
        let args = UserArgs {
            user_id: user_id.into(),
        };
        match reply {
            Reply::Yes => Self::SendActivityJoinInvite { args },
            Reply::No | Reply::Ignore => Self::CloseActivityRequest { args },
        }
    }
}

/// A command with its correlation nonce.
///
/// Serializes flat: `{"cmd":"SET_ACTIVITY","args":{...},"nonce":"1"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(flatten)]
    pub command: RpcCommand,
    pub nonce: String,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Payload of a Close frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Any Frame-opcode message from the peer, before interpretation.
///
/// `evt` is kept as a string so that events this client doesn't know
/// about still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub cmd: String,
    #[serde(default)]
    pub evt: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// An inbound message the client acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The handshake was accepted.
    Ready(User),
    /// The user accepted an invite or clicked Join.
    JoinGame { secret: String },
    /// The user clicked Spectate.
    SpectateGame { secret: String },
    /// Another user asked to join.
    JoinRequest(User),
    /// The peer rejected a command.
    Error { code: i32, message: String },
}

#[derive(Deserialize)]
struct ReadyData {
    user: User,
}

#[derive(Deserialize)]
struct SecretData {
    secret: String,
}

#[derive(Deserialize)]
struct ErrorData {
    code: i32,
    #[serde(default)]
    message: String,
}

impl IncomingMessage {
    /// Whether this is the `DISPATCH`/`READY` message.
    pub fn is_ready(&self) -> bool {
        self.cmd == "DISPATCH" && self.evt.as_deref() == Some("READY")
    }

    /// Interprets the message.
    ///
    /// `Ok(None)` means the message is well formed but carries nothing to
    /// act on (e.g. the echo of our own `SET_ACTIVITY`). Known events with
    /// missing or mistyped `data` are an error.
    pub fn into_dispatch(self) -> Result<Option<Dispatch>, ProtocolError> {
        let Some(evt) = self.evt else {
            return Ok(None);
        };

        if evt == "ERROR" {
            let data: ErrorData = parse_data(self.data, &evt)?;
            return Ok(Some(Dispatch::Error {
                code: data.code,
                message: data.message,
            }));
        }

        if self.cmd != "DISPATCH" {
            return Ok(None);
        }

        let dispatch = match evt.as_str() {
            "READY" => Dispatch::Ready(parse_data::<ReadyData>(self.data, &evt)?.user),
            "ACTIVITY_JOIN" => Dispatch::JoinGame {
                secret: parse_data::<SecretData>(self.data, &evt)?.secret,
            },
            "ACTIVITY_SPECTATE" => Dispatch::SpectateGame {
                secret: parse_data::<SecretData>(self.data, &evt)?.secret,
            },
            "ACTIVITY_JOIN_REQUEST" => {
                Dispatch::JoinRequest(parse_data::<ReadyData>(self.data, &evt)?.user)
            }
            _ => return Ok(None),
        };
        Ok(Some(dispatch))
    }
}

fn parse_data<T: serde::de::DeserializeOwned>(
    data: Option<serde_json::Value>,
    evt: &str,
) -> Result<T, ProtocolError> {
    let data = data.ok_or_else(|| ProtocolError::InvalidMessage(format!("{evt} without data")))?;
    serde_json::from_value(data).map_err(ProtocolError::Decode)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn incoming(value: serde_json::Value) -> IncomingMessage {
        serde_json::from_value(value).unwrap()
    }

    fn user_json() -> serde_json::Value {
        json!({
            "id": "53908232506183680",
            "username": "Mason",
            "discriminator": "1337",
            "avatar": "a_bab14f271d565501444b2ca3be944b25"
        })
    }

    // =====================================================================
    // Outbound
    // =====================================================================

    #[test]
    fn test_handshake_json_format() {
        let json = serde_json::to_value(Handshake::new("383226320970055681")).unwrap();
        assert_eq!(json, json!({ "v": 1, "client_id": "383226320970055681" }));
    }

    #[test]
    fn test_set_activity_request_is_flat() {
        let request = Request {
            command: RpcCommand::SetActivity {
                args: SetActivityArgs {
                    pid: 42,
                    activity: Some(Activity::default()),
                },
            },
            nonce: "7".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "cmd": "SET_ACTIVITY",
                "args": { "pid": 42, "activity": { "instance": false } },
                "nonce": "7"
            })
        );
    }

    #[test]
    fn test_clear_activity_omits_activity() {
        let json = serde_json::to_value(RpcCommand::set_activity(None)).unwrap();
        assert_eq!(json["cmd"], "SET_ACTIVITY");
        assert_eq!(json["args"]["pid"], std::process::id());
        assert!(json["args"].get("activity").is_none());
    }

    #[test]
    fn test_subscribe_request_json_format() {
        let request = Request {
            command: RpcCommand::Subscribe {
                evt: Subscription::ActivityJoinRequest,
            },
            nonce: "3".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({ "cmd": "SUBSCRIBE", "evt": "ACTIVITY_JOIN_REQUEST", "nonce": "3" })
        );
    }

    #[test]
    fn test_reply_maps_to_invite_or_close() {
        let yes = serde_json::to_value(RpcCommand::reply("1", Reply::Yes)).unwrap();
        assert_eq!(yes["cmd"], "SEND_ACTIVITY_JOIN_INVITE");
        assert_eq!(yes["args"]["user_id"], "1");

        for reply in [Reply::No, Reply::Ignore] {
            let json = serde_json::to_value(RpcCommand::reply("1", reply)).unwrap();
            assert_eq!(json["cmd"], "CLOSE_ACTIVITY_REQUEST");
        }
    }

    // =====================================================================
    // Inbound
    // =====================================================================

    #[test]
    fn test_ready_dispatch_carries_user() {
        let msg = incoming(json!({
            "cmd": "DISPATCH",
            "evt": "READY",
            "data": { "v": 1, "config": {}, "user": user_json() }
        }));
        assert!(msg.is_ready());

        let Some(Dispatch::Ready(user)) = msg.into_dispatch().unwrap() else {
            panic!("expected Ready");
        };
        assert_eq!(user.user_id, "53908232506183680");
        assert_eq!(user.username, "Mason");
        assert_eq!(user.discriminator, "1337");
        assert_eq!(
            user.avatar_hash.as_deref(),
            Some("a_bab14f271d565501444b2ca3be944b25")
        );
    }

    #[test]
    fn test_user_without_avatar_parses() {
        let user: User = serde_json::from_value(json!({
            "id": "1", "username": "x", "discriminator": "0001", "avatar": null
        }))
        .unwrap();
        assert_eq!(user.avatar_hash, None);
        assert_eq!(user.to_string(), "x#0001 (1)");
    }

    #[test]
    fn test_join_and_spectate_dispatch_secrets() {
        let join = incoming(json!({
            "cmd": "DISPATCH", "evt": "ACTIVITY_JOIN", "data": { "secret": "j" }
        }));
        assert_eq!(
            join.into_dispatch().unwrap(),
            Some(Dispatch::JoinGame { secret: "j".into() })
        );

        let spectate = incoming(json!({
            "cmd": "DISPATCH", "evt": "ACTIVITY_SPECTATE", "data": { "secret": "s" }
        }));
        assert_eq!(
            spectate.into_dispatch().unwrap(),
            Some(Dispatch::SpectateGame { secret: "s".into() })
        );
    }

    #[test]
    fn test_join_request_dispatch_carries_user() {
        let msg = incoming(json!({
            "cmd": "DISPATCH",
            "evt": "ACTIVITY_JOIN_REQUEST",
            "data": { "user": user_json() }
        }));
        assert!(matches!(
            msg.into_dispatch().unwrap(),
            Some(Dispatch::JoinRequest(u)) if u.username == "Mason"
        ));
    }

    #[test]
    fn test_error_event_on_command_response() {
        let msg = incoming(json!({
            "cmd": "SET_ACTIVITY",
            "evt": "ERROR",
            "nonce": "4",
            "data": { "code": 4000, "message": "child \"activity\" fails" }
        }));
        assert_eq!(
            msg.into_dispatch().unwrap(),
            Some(Dispatch::Error {
                code: 4000,
                message: "child \"activity\" fails".into()
            })
        );
    }

    #[test]
    fn test_command_echo_is_not_a_dispatch() {
        let msg = incoming(json!({
            "cmd": "SET_ACTIVITY", "nonce": "1", "data": {}
        }));
        assert_eq!(msg.into_dispatch().unwrap(), None);
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let msg = incoming(json!({ "cmd": "DISPATCH", "evt": "GUILD_STATUS", "data": {} }));
        assert_eq!(msg.into_dispatch().unwrap(), None);
    }

    #[test]
    fn test_known_event_without_data_is_invalid() {
        let msg = incoming(json!({ "cmd": "DISPATCH", "evt": "ACTIVITY_JOIN" }));
        assert!(matches!(
            msg.into_dispatch(),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_known_event_with_wrong_data_is_decode_error() {
        let msg = incoming(json!({
            "cmd": "DISPATCH", "evt": "ACTIVITY_SPECTATE", "data": { "secret": 5 }
        }));
        assert!(matches!(msg.into_dispatch(), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_close_reason_parses() {
        let reason: CloseReason =
            serde_json::from_str(r#"{"code":4000,"message":"Invalid Client ID"}"#).unwrap();
        assert_eq!(reason.code, 4000);
        assert_eq!(reason.message, "Invalid Client ID");
    }
}
