//! End-to-end tests of the connection lifecycle against a mock gateway

use anyhow::{Context, Result};
use gateway_client::{Envelope, GatewayClient, GatewayError, LifecycleState, OpCode};
use gateway_common::DEFAULT_INTENTS;
use integration_tests::{
    eventually, next_states, resume_fields, test_config, MockGateway, Recorder, RunningClient, ServerConnection,
    SESSION_ID, TEST_TOKEN,
};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

/// Start a client against a fresh mock and complete Identify/READY on the first connection
async fn connected(seq: u64) -> Result<(MockGateway, RunningClient, ServerConnection)> {
    let gateway = MockGateway::start().await?;
    let running = RunningClient::spawn(GatewayClient::new(test_config(&gateway.url())));
    let mut conn = gateway.accept().await?;
    conn.handshake(SESSION_ID, &gateway.url(), seq).await?;
    running.wait_for(LifecycleState::Ready).await?;
    Ok((gateway, running, conn))
}

// =============================================================================
// Session establishment
// =============================================================================

#[tokio::test]
async fn test_identify_ready_and_shutdown() -> Result<()> {
    let gateway = MockGateway::start().await?;
    let client = GatewayClient::new(test_config(&gateway.url()));
    let (mut ready, handler) = Recorder::new();
    assert!(client.on_ready(handler).is_some());
    let running = RunningClient::spawn(client.clone());

    let mut conn = gateway.accept().await?;
    let identify = conn.handshake(SESSION_ID, &gateway.url(), 1).await?;
    let d = identify.d.context("Identify without payload")?;
    assert_eq!(d["token"], TEST_TOKEN);
    assert_eq!(d["intents"], DEFAULT_INTENTS);

    let envelope = ready.next().await?;
    assert!(envelope.is_event("READY"));

    running.wait_for(LifecycleState::Ready).await?;
    assert_eq!(client.session().session_id.as_deref(), Some(SESSION_ID));
    assert_eq!(client.session().resume_url, Some(gateway.url()));
    assert_eq!(client.sequence(), Some(1));

    client.shutdown();
    assert_eq!(conn.recv_close().await?, Some(1000));
    running.join().await??;

    assert_eq!(client.lifecycle(), LifecycleState::Disconnected);
    assert_eq!(ready.pending(), 0);
    Ok(())
}

#[tokio::test]
async fn test_on_ready_after_ready_runs_immediately() -> Result<()> {
    let (_gateway, running, _conn) = connected(1).await?;

    let (mut ready, handler) = Recorder::new();
    assert!(running.client.on_ready(handler).is_none());
    assert!(ready.next().await?.is_event("READY"));

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_hello_is_ignored() -> Result<()> {
    let (_gateway, running, mut conn) = connected(1).await?;

    conn.send_hello(45_000).await?;
    conn.send(&Envelope::client(OpCode::Heartbeat, None)).await?;

    // Frames are handled in order: a second Identify would come before the heartbeat
    let next = conn.recv().await?;
    assert_eq!(next.op, OpCode::Heartbeat);
    assert_eq!(running.client.lifecycle(), LifecycleState::Ready);

    running.stop().await??;
    Ok(())
}

// =============================================================================
// Resume and restart
// =============================================================================

#[tokio::test]
async fn test_resumable_close_resumes_with_highest_sequence() -> Result<()> {
    let (gateway, running, mut conn) = connected(1).await?;

    for seq in [2, 5, 3] {
        conn.send_dispatch("MESSAGE_CREATE", seq).await?;
    }
    eventually(|| running.client.sequence() == Some(5)).await?;
    conn.close(4000).await?;

    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    let resume = conn.recv_skip_heartbeats().await?;
    assert_eq!(resume.op, OpCode::Resume);
    assert_eq!(resume_fields(&resume)?, (SESSION_ID.to_string(), 5));

    conn.send(&Envelope::dispatch("RESUMED", 6, json!({}))).await?;
    running.wait_for(LifecycleState::Ready).await?;
    assert_eq!(running.client.sequence(), Some(6));
    assert_eq!(running.client.session().session_id.as_deref(), Some(SESSION_ID));

    running.client.shutdown();
    assert_eq!(conn.recv_close().await?, Some(1000));
    running.join().await??;
    Ok(())
}

#[tokio::test]
async fn test_lifecycle_order_across_resume_and_shutdown() -> Result<()> {
    use LifecycleState::{AwaitingHello, Closing, Connecting, Disconnected, Handshaking, Ready};

    let gateway = MockGateway::start().await?;
    let client = GatewayClient::new(test_config(&gateway.url()));
    let mut events = client.lifecycle_events();
    let running = RunningClient::spawn(client.clone());

    let mut conn = gateway.accept().await?;
    conn.handshake(SESSION_ID, &gateway.url(), 1).await?;
    assert_eq!(
        next_states(&mut events, 4).await?,
        [Connecting, AwaitingHello, Handshaking, Ready]
    );

    // Resumable close never passes through Disconnected
    conn.close(4000).await?;
    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    assert_eq!(conn.recv_skip_heartbeats().await?.op, OpCode::Resume);
    conn.send(&Envelope::dispatch("RESUMED", 2, json!({}))).await?;
    assert_eq!(
        next_states(&mut events, 5).await?,
        [Closing, Connecting, AwaitingHello, Handshaking, Ready]
    );

    client.shutdown();
    assert_eq!(conn.recv_close().await?, Some(1000));
    running.join().await??;
    assert_eq!(next_states(&mut events, 2).await?, [Closing, Disconnected]);
    assert!(events.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_lifecycle_order_across_restart() -> Result<()> {
    use LifecycleState::{AwaitingHello, Closing, Connecting, Disconnected, Handshaking, Ready};

    let (gateway, running, conn) = connected(4).await?;
    let mut events = running.client.lifecycle_events();

    // Fatal close clears the session and goes through Disconnected
    conn.close(1000).await?;
    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    assert_eq!(conn.recv_skip_heartbeats().await?.op, OpCode::Identify);
    assert_eq!(
        next_states(&mut events, 5).await?,
        [Closing, Disconnected, Connecting, AwaitingHello, Handshaking]
    );

    conn.send_ready(SESSION_ID, &gateway.url(), 1).await?;
    assert_eq!(next_states(&mut events, 1).await?, [Ready]);

    running.stop().await??;
    assert_eq!(next_states(&mut events, 2).await?, [Closing, Disconnected]);
    Ok(())
}

#[tokio::test]
async fn test_normal_close_restarts_with_identify() -> Result<()> {
    let (gateway, running, conn) = connected(4).await?;
    conn.close(1000).await?;

    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    let envelope = conn.recv_skip_heartbeats().await?;
    assert_eq!(envelope.op, OpCode::Identify);
    assert_eq!(running.client.sequence(), None);
    assert!(!running.client.session().is_established());

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_authentication_failure_is_fatal() -> Result<()> {
    let (_gateway, running, conn) = connected(1).await?;
    let client = running.client.clone();
    conn.close(4004).await?;

    let result = running.join().await?;
    assert!(matches!(result, Err(GatewayError::Fatal { code: Some(4004), .. })));
    assert_eq!(client.lifecycle(), LifecycleState::Disconnected);
    assert!(!client.session().is_established());
    Ok(())
}

#[tokio::test]
async fn test_fatal_close_without_auto_restart_stops() -> Result<()> {
    let gateway = MockGateway::start().await?;
    let mut config = test_config(&gateway.url());
    config.connection.auto_restart = false;
    let running = RunningClient::spawn(GatewayClient::new(config));

    let mut conn = gateway.accept().await?;
    conn.handshake(SESSION_ID, &gateway.url(), 1).await?;
    running.wait_for(LifecycleState::Ready).await?;
    conn.close(1000).await?;

    let result = running.join().await?;
    assert!(matches!(result, Err(GatewayError::Fatal { code: Some(1000), .. })));
    Ok(())
}

#[tokio::test]
async fn test_reconnect_request_resumes() -> Result<()> {
    let (gateway, running, mut conn) = connected(3).await?;

    conn.send(&Envelope::reconnect()).await?;
    assert_eq!(conn.recv_close().await?, Some(4000));

    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    let resume = conn.recv_skip_heartbeats().await?;
    assert_eq!(resume_fields(&resume)?, (SESSION_ID.to_string(), 3));

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_resumable_invalid_session_resumes() -> Result<()> {
    let (gateway, running, mut conn) = connected(2).await?;

    conn.send(&Envelope::invalid_session(true)).await?;
    assert_eq!(conn.recv_close().await?, Some(4000));

    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    assert_eq!(conn.recv_skip_heartbeats().await?.op, OpCode::Resume);

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_non_resumable_invalid_session_identifies() -> Result<()> {
    let (gateway, running, mut conn) = connected(2).await?;

    conn.send(&Envelope::invalid_session(false)).await?;
    assert_eq!(conn.recv_close().await?, Some(1000));

    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    assert_eq!(conn.recv_skip_heartbeats().await?.op, OpCode::Identify);

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_hello_timeout_restarts() -> Result<()> {
    let gateway = MockGateway::start().await?;
    let mut config = test_config(&gateway.url());
    config.connection.hello_timeout_ms = 200;
    let running = RunningClient::spawn(GatewayClient::new(config));

    let mut silent = gateway.accept().await?;
    assert_eq!(silent.recv_close().await?, Some(1000));

    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    assert_eq!(conn.recv_skip_heartbeats().await?.op, OpCode::Identify);

    running.stop().await??;
    Ok(())
}

// =============================================================================
// Heartbeats
// =============================================================================

#[tokio::test]
async fn test_heartbeat_carries_last_sequence() -> Result<()> {
    let gateway = MockGateway::start().await?;
    let mut config = test_config(&gateway.url());
    config.connection.zombie_detection = false;
    let running = RunningClient::spawn(GatewayClient::new(config));

    let mut conn = gateway.accept().await?;
    conn.send_hello(100).await?;
    assert_eq!(conn.recv_skip_heartbeats().await?.op, OpCode::Identify);
    conn.send_ready(SESSION_ID, &gateway.url(), 1).await?;
    conn.send_dispatch("MESSAGE_CREATE", 7).await?;

    loop {
        let heartbeat = conn.recv_heartbeat().await?;
        if heartbeat.d == Some(json!(7)) {
            break;
        }
    }

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_unacknowledged_heartbeat_triggers_resume() -> Result<()> {
    let gateway = MockGateway::start().await?;
    let running = RunningClient::spawn(GatewayClient::new(test_config(&gateway.url())));

    let mut conn = gateway.accept().await?;
    conn.send_hello(100).await?;
    assert_eq!(conn.recv_skip_heartbeats().await?.op, OpCode::Identify);
    conn.send_ready(SESSION_ID, &gateway.url(), 1).await?;

    // No acks: the second tick finds the first beat outstanding
    assert_eq!(conn.recv_close().await?, Some(4000));

    let mut conn = gateway.accept().await?;
    conn.send_hello(45_000).await?;
    assert_eq!(conn.recv_skip_heartbeats().await?.op, OpCode::Resume);

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_heartbeat_request_and_ack_measure_latency() -> Result<()> {
    let (_gateway, running, mut conn) = connected(9).await?;
    assert_eq!(running.client.latency(), None);

    conn.send(&Envelope::client(OpCode::Heartbeat, None)).await?;
    let heartbeat = conn.recv_heartbeat().await?;
    assert_eq!(heartbeat.d, Some(json!(9)));

    conn.send(&Envelope::heartbeat_ack()).await?;
    eventually(|| running.client.latency().is_some()).await?;

    running.stop().await??;
    Ok(())
}

// =============================================================================
// Framing and dispatch
// =============================================================================

#[tokio::test]
async fn test_malformed_frames_are_dropped() -> Result<()> {
    let (_gateway, running, mut conn) = connected(1).await?;
    let (mut messages, handler) = Recorder::new();
    running.client.on_event("message_create", handler);

    conn.send_raw(Message::Text("{not json".to_string())).await?;
    conn.send_raw(Message::Binary(vec![0x78, 0x9c])).await?;
    conn.send_dispatch("MESSAGE_CREATE", 2).await?;

    let envelope = messages.next().await?;
    assert_eq!(envelope.s, Some(2));
    assert_eq!(running.client.lifecycle(), LifecycleState::Ready);
    assert_eq!(running.client.sequence(), Some(2));

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_dispatch_reaches_matching_handlers_only() -> Result<()> {
    let (_gateway, running, mut conn) = connected(1).await?;
    let (mut created, on_created) = Recorder::new();
    let (mut any, on_any) = Recorder::new();
    let (mut deleted, on_deleted) = Recorder::new();
    running.client.on_event("MESSAGE_CREATE", on_created);
    running.client.on_any(on_any);
    let handle = running.client.on_event("MESSAGE_DELETE", on_deleted);
    assert!(running.client.unsubscribe(handle));

    conn.send_dispatch("MESSAGE_DELETE", 2).await?;
    conn.send_dispatch("MESSAGE_CREATE", 3).await?;

    assert_eq!(created.next().await?.s, Some(3));
    // READY may still be in flight when the registration lands
    let mut first = any.next().await?;
    if first.is_event("READY") {
        first = any.next().await?;
    }
    assert_eq!(first.s, Some(2));
    assert_eq!(any.next().await?.s, Some(3));
    assert_eq!(deleted.pending(), 0);

    running.stop().await??;
    Ok(())
}

#[tokio::test]
async fn test_send_goes_through_live_connection() -> Result<()> {
    let gateway = MockGateway::start().await?;
    let client = GatewayClient::new(test_config(&gateway.url()));
    let presence = Envelope::client(OpCode::PresenceUpdate, Some(json!({"status": "idle"})));
    assert!(matches!(client.send(presence.clone()), Err(GatewayError::NotConnected)));

    let running = RunningClient::spawn(client.clone());
    let mut conn = gateway.accept().await?;
    conn.handshake(SESSION_ID, &gateway.url(), 1).await?;
    running.wait_for(LifecycleState::Ready).await?;

    client.send(presence)?;
    let received = conn.recv_skip_heartbeats().await?;
    assert_eq!(received.op, OpCode::PresenceUpdate);
    assert_eq!(received.d, Some(json!({"status": "idle"})));

    // Event name and sequence never leave the client
    let tagged = Envelope {
        op: OpCode::PresenceUpdate,
        d: Some(json!({"status": "dnd"})),
        t: Some("PRESENCE_UPDATE".to_string()),
        s: Some(5),
    };
    client.send(tagged)?;
    let received = conn.recv_skip_heartbeats().await?;
    assert_eq!(received.d, Some(json!({"status": "dnd"})));
    assert_eq!((received.t, received.s), (None, None));

    assert!(matches!(
        client.send(Envelope::dispatch("MESSAGE_CREATE", 5, json!({}))),
        Err(GatewayError::NotClientOp(OpCode::Dispatch))
    ));

    running.stop().await??;
    assert!(matches!(
        client.send(Envelope::heartbeat(None)),
        Err(GatewayError::NotConnected)
    ));
    Ok(())
}

#[tokio::test]
async fn test_run_twice_is_rejected() -> Result<()> {
    let (_gateway, running, _conn) = connected(1).await?;
    assert!(matches!(
        running.client.run().await,
        Err(GatewayError::AlreadyRunning)
    ));
    running.stop().await??;
    Ok(())
}
