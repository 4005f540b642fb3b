//! Session tests against an in-process peer.
//!
//! The peer side is a raw `DuplexStream` from [`MemoryAcceptor`]; helpers
//! below read and write frames on it by hand so the tests see exactly
//! what crosses the wire.

use std::time::Duration;

use drpc_protocol::{Dispatch, OpCode, Presence};
use drpc_session::{PresenceCache, PresenceUpdate, Session, SessionConfig, SessionError, SessionState};
use drpc_transport::{MemoryAcceptor, MemoryTransport};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

// =========================================================================
// Helpers
// =========================================================================

fn new_session() -> (Session<MemoryTransport>, MemoryAcceptor) {
    let (transport, acceptor) = MemoryTransport::new();
    (Session::new(transport, SessionConfig::default()), acceptor)
}

async fn write_raw(peer: &mut DuplexStream, opcode: u32, payload: &[u8]) {
    let mut bytes = Vec::with_capacity(8 + payload.len());
    bytes.extend_from_slice(&opcode.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    peer.write_all(&bytes).await.unwrap();
}

async fn write_json(peer: &mut DuplexStream, opcode: OpCode, value: &Value) {
    write_raw(peer, opcode as u32, &serde_json::to_vec(value).unwrap()).await;
}

async fn read_raw(peer: &mut DuplexStream) -> (u32, Vec<u8>) {
    let mut header = [0u8; 8];
    peer.read_exact(&mut header).await.unwrap();
    let opcode = u32::from_le_bytes(header[..4].try_into().unwrap());
    let len = u32::from_le_bytes(header[4..].try_into().unwrap()) as usize;
    let mut payload = vec![0u8; len];
    peer.read_exact(&mut payload).await.unwrap();
    (opcode, payload)
}

async fn read_json(peer: &mut DuplexStream) -> (u32, Value) {
    let (opcode, payload) = read_raw(peer).await;
    (opcode, serde_json::from_slice(&payload).unwrap())
}

fn ready() -> Value {
    json!({
        "cmd": "DISPATCH",
        "evt": "READY",
        "data": {
            "v": 1,
            "user": { "id": "42", "username": "ferris", "discriminator": "0001", "avatar": null }
        }
    })
}

/// Accepts the connection, checks the handshake and answers READY.
async fn accept_ready(acceptor: &mut MemoryAcceptor, client_id: &str) -> DuplexStream {
    let mut peer = acceptor.accept().await.unwrap();
    let (opcode, handshake) = read_json(&mut peer).await;
    assert_eq!(opcode, OpCode::Handshake as u32);
    assert_eq!(handshake, json!({ "v": 1, "client_id": client_id }));
    write_json(&mut peer, OpCode::Frame, &ready()).await;
    peer
}

async fn connected() -> (Session<MemoryTransport>, MemoryAcceptor, DuplexStream) {
    let (mut session, mut acceptor) = new_session();
    let (user, peer) = tokio::join!(session.connect("123"), accept_ready(&mut acceptor, "123"));
    user.unwrap();
    (session, acceptor, peer)
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_connect_returns_ready_user() {
    let (mut session, mut acceptor) = new_session();
    let (user, _peer) = tokio::join!(session.connect("123"), accept_ready(&mut acceptor, "123"));

    let user = user.unwrap();
    assert_eq!(user.user_id, "42");
    assert_eq!(user.username, "ferris");
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.user().map(|u| u.user_id.as_str()), Some("42"));
    assert_eq!(session.last_error(), (0, ""));
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let (mut session, _acceptor, _peer) = connected().await;
    assert!(matches!(
        session.connect("123").await,
        Err(SessionError::AlreadyConnected)
    ));
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_ping_during_handshake_is_answered() {
    let (mut session, mut acceptor) = new_session();
    let peer = async {
        let mut peer = acceptor.accept().await.unwrap();
        read_json(&mut peer).await;
        write_raw(&mut peer, OpCode::Ping as u32, b"hb").await;
        let pong = read_raw(&mut peer).await;
        write_json(&mut peer, OpCode::Frame, &ready()).await;
        (peer, pong)
    };

    let (user, (_peer, pong)) = tokio::join!(session.connect("123"), peer);
    assert!(user.is_ok());
    assert_eq!(pong, (OpCode::Pong as u32, b"hb".to_vec()));
}

#[tokio::test]
async fn test_close_during_handshake_records_peer_reason() {
    let (mut session, mut acceptor) = new_session();
    let peer = async {
        let mut peer = acceptor.accept().await.unwrap();
        read_json(&mut peer).await;
        write_json(
            &mut peer,
            OpCode::Close,
            &json!({ "code": 4000, "message": "Invalid Client ID" }),
        )
        .await;
        peer
    };

    let (result, mut peer) = tokio::join!(session.connect("bogus"), peer);
    match result {
        Err(SessionError::Closed { code, message }) => {
            assert_eq!(code, 4000);
            assert_eq!(message, "Invalid Client ID");
        }
        other => panic!("expected Closed, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.last_error(), (4000, "Invalid Client ID"));

    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_ready_reply_rejects_handshake() {
    let (mut session, mut acceptor) = new_session();
    let peer = async {
        let mut peer = acceptor.accept().await.unwrap();
        read_json(&mut peer).await;
        write_json(&mut peer, OpCode::Frame, &json!({ "cmd": "SET_ACTIVITY", "data": {} })).await;
        peer
    };

    let (result, _peer) = tokio::join!(session.connect("123"), peer);
    assert!(matches!(result, Err(SessionError::HandshakeRejected(_))));
    assert_eq!(session.last_error().0, 3);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_times_out_without_ready() {
    let (transport, mut acceptor) = MemoryTransport::new();
    let mut session = Session::new(
        transport,
        SessionConfig {
            handshake_timeout: Duration::from_millis(200),
            ..SessionConfig::default()
        },
    );
    let peer = async {
        let mut peer = acceptor.accept().await.unwrap();
        read_json(&mut peer).await;
        peer
    };

    let (result, _peer) = tokio::join!(session.connect("123"), peer);
    assert!(matches!(result, Err(SessionError::HandshakeTimeout(d)) if d == Duration::from_millis(200)));
    assert_eq!(session.last_error().0, 3);
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_connect_without_peer_fails_with_transport_error() {
    let (transport, acceptor) = MemoryTransport::new();
    drop(acceptor);
    let mut session = Session::new(transport, SessionConfig::default());

    assert!(matches!(
        session.connect("123").await,
        Err(SessionError::Transport(_))
    ));
    assert_eq!(session.last_error().0, 1);
}

// =========================================================================
// Polling
// =========================================================================

#[tokio::test]
async fn test_poll_returns_none_when_idle() {
    let (mut session, _acceptor, _peer) = connected().await;
    assert_eq!(session.poll().await.unwrap(), None);
}

#[tokio::test]
async fn test_poll_drains_dispatches_in_order() {
    let (mut session, _acceptor, mut peer) = connected().await;
    write_json(
        &mut peer,
        OpCode::Frame,
        &json!({ "cmd": "DISPATCH", "evt": "ACTIVITY_JOIN", "data": { "secret": "j1" } }),
    )
    .await;
    write_json(
        &mut peer,
        OpCode::Frame,
        &json!({ "cmd": "SET_ACTIVITY", "nonce": "1", "data": {} }),
    )
    .await;
    write_json(
        &mut peer,
        OpCode::Frame,
        &json!({ "cmd": "DISPATCH", "evt": "ACTIVITY_SPECTATE", "data": { "secret": "s1" } }),
    )
    .await;

    assert_eq!(
        session.poll().await.unwrap(),
        Some(Dispatch::JoinGame { secret: "j1".into() })
    );
    assert_eq!(
        session.poll().await.unwrap(),
        Some(Dispatch::SpectateGame { secret: "s1".into() })
    );
    assert_eq!(session.poll().await.unwrap(), None);
}

#[tokio::test]
async fn test_ping_is_answered_with_same_payload() {
    let (mut session, _acceptor, mut peer) = connected().await;
    write_raw(&mut peer, OpCode::Ping as u32, br#"{"n":7}"#).await;

    assert_eq!(session.poll().await.unwrap(), None);
    assert_eq!(read_raw(&mut peer).await, (OpCode::Pong as u32, br#"{"n":7}"#.to_vec()));
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_malformed_message_is_skipped() {
    let (mut session, _acceptor, mut peer) = connected().await;
    write_raw(&mut peer, OpCode::Frame as u32, b"{not json").await;
    write_json(
        &mut peer,
        OpCode::Frame,
        &json!({ "cmd": "DISPATCH", "evt": "ACTIVITY_JOIN", "data": {} }),
    )
    .await;

    assert_eq!(session.poll().await.unwrap(), None);
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_error_event_does_not_end_session() {
    let (mut session, _acceptor, mut peer) = connected().await;
    write_json(
        &mut peer,
        OpCode::Frame,
        &json!({ "cmd": "SET_ACTIVITY", "evt": "ERROR", "nonce": "1",
                 "data": { "code": 5005, "message": "secrets must be unique" } }),
    )
    .await;

    assert_eq!(
        session.poll().await.unwrap(),
        Some(Dispatch::Error {
            code: 5005,
            message: "secrets must be unique".into()
        })
    );
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_close_frame_ends_session() {
    let (mut session, _acceptor, mut peer) = connected().await;
    write_json(&mut peer, OpCode::Close, &json!({ "code": 1000, "message": "User logged out" })).await;

    let err = session.poll().await.unwrap_err();
    assert!(err.is_peer_close());
    assert_eq!(session.last_error(), (1000, "User logged out"));
    assert_eq!(session.state(), SessionState::Disconnected);

    // Our end was closed too.
    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_peer_drop_reports_pipe_closed() {
    let (mut session, _acceptor, peer) = connected().await;
    drop(peer);

    let err = session.poll().await.unwrap_err();
    assert!(matches!(err, SessionError::Closed { code: 1, .. }));
    assert_eq!(session.last_error(), (1, "Pipe closed"));
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_unknown_opcode_is_read_corrupt() {
    let (mut session, _acceptor, mut peer) = connected().await;
    write_raw(&mut peer, 9, b"{}").await;

    assert!(matches!(
        session.poll().await,
        Err(SessionError::ReadCorrupt(_))
    ));
    assert_eq!(session.last_error().0, 2);
}

#[tokio::test]
async fn test_inbound_handshake_is_read_corrupt() {
    let (mut session, _acceptor, mut peer) = connected().await;
    write_raw(&mut peer, OpCode::Handshake as u32, b"{}").await;

    let err = session.poll().await.unwrap_err();
    assert!(matches!(err, SessionError::ReadCorrupt(ref m) if m == "Bad ipc frame"));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_payload_is_read_corrupt() {
    let (mut session, _acceptor, mut peer) = connected().await;

    // Header announces 100 bytes; only 3 ever arrive.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(OpCode::Frame as u32).to_le_bytes());
    bytes.extend_from_slice(&100u32.to_le_bytes());
    bytes.extend_from_slice(b"{\"c");
    peer.write_all(&bytes).await.unwrap();

    let err = session.poll().await.unwrap_err();
    assert!(matches!(err, SessionError::ReadCorrupt(ref m) if m == "Partial data in frame"));
    assert_eq!(session.last_error().0, 2);
    assert_eq!(session.state(), SessionState::Disconnected);

    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_payload_split_across_writes_is_reassembled() {
    let (mut session, _acceptor, mut peer) = connected().await;
    let payload = serde_json::to_vec(
        &json!({ "cmd": "DISPATCH", "evt": "ACTIVITY_JOIN", "data": { "secret": "late" } }),
    )
    .unwrap();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(OpCode::Frame as u32).to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&payload[..5]);
    peer.write_all(&bytes).await.unwrap();

    let rest = payload[5..].to_vec();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        peer.write_all(&rest).await.unwrap();
        peer
    });

    assert_eq!(
        session.poll().await.unwrap(),
        Some(Dispatch::JoinGame { secret: "late".into() })
    );
    assert!(session.is_connected());
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn test_poll_while_disconnected() {
    let (mut session, _acceptor) = new_session();
    assert!(matches!(session.poll().await, Err(SessionError::NotConnected)));
}

// =========================================================================
// Sending
// =========================================================================

#[tokio::test]
async fn test_commands_carry_increasing_nonces() {
    let (mut session, _acceptor, mut peer) = connected().await;
    session.subscribe().await.unwrap();

    for (expected_nonce, evt) in [
        ("1", "ACTIVITY_JOIN"),
        ("2", "ACTIVITY_SPECTATE"),
        ("3", "ACTIVITY_JOIN_REQUEST"),
    ] {
        let (opcode, body) = read_json(&mut peer).await;
        assert_eq!(opcode, OpCode::Frame as u32);
        assert_eq!(body, json!({ "cmd": "SUBSCRIBE", "evt": evt, "nonce": expected_nonce }));
    }
}

#[tokio::test]
async fn test_send_while_disconnected_is_rejected() {
    let (mut session, _acceptor) = new_session();
    assert!(matches!(
        session.send_presence(&PresenceUpdate::Clear).await,
        Err(SessionError::NotConnected)
    ));
}

// =========================================================================
// PresenceCache
// =========================================================================

fn presence(state: &str) -> PresenceUpdate {
    let mut p = Presence::new();
    p.set_state(state).unwrap();
    PresenceUpdate::Set(p)
}

#[tokio::test]
async fn test_cache_sends_only_last_update_after_ready() {
    let (mut session, mut acceptor) = new_session();
    let mut cache = PresenceCache::new();

    assert!(!cache.submit(&mut session, presence("A")).await.unwrap());
    assert!(!cache.submit(&mut session, presence("B")).await.unwrap());

    let (user, mut peer) = tokio::join!(session.connect("123"), accept_ready(&mut acceptor, "123"));
    user.unwrap();
    assert!(cache.flush_if_ready(&mut session).await.unwrap());
    assert!(cache.pending().is_none());

    let (_, body) = read_json(&mut peer).await;
    assert_eq!(body["cmd"], "SET_ACTIVITY");
    assert_eq!(body["args"]["activity"]["state"], "B");

    // Once flushed, updates go straight out.
    assert!(cache.submit(&mut session, PresenceUpdate::Clear).await.unwrap());
    let (_, body) = read_json(&mut peer).await;
    assert_eq!(body["args"]["pid"], std::process::id());
    assert!(body["args"].get("activity").is_none());
}

#[tokio::test]
async fn test_cache_flush_with_nothing_pending() {
    let (mut session, _acceptor, _peer) = connected().await;
    let mut cache = PresenceCache::new();
    assert!(!cache.flush_if_ready(&mut session).await.unwrap());
    assert!(cache.is_flushed());
}

#[tokio::test]
async fn test_cache_holds_updates_after_reset() {
    let (mut session, _acceptor, _peer) = connected().await;
    let mut cache = PresenceCache::new();
    cache.flush_if_ready(&mut session).await.unwrap();

    session.close().await;
    cache.reset();
    assert!(!cache.submit(&mut session, presence("later")).await.unwrap());
    assert_eq!(cache.pending(), Some(&presence("later")));
}
