//! End-to-end tests over a loopback socket.
//!
//! Each test starts a real server with a scripted engine and talks to it
//! through the encrypted channel, exactly as a remote client would.

use std::{fs, sync::Arc, time::Duration};

use futures::SinkExt;
use lineworks_core::{InferenceEngine, ModelDirectory};
use lineworks_crypto::CryptoScheme;
use lineworks_harness::{
    ScriptedEngine, TEST_KDF_ITERATIONS, TEST_SECRET, TestChannel, TestServer, Transcript,
    check_generation, connect_channel, connect_raw, test_config,
};
use lineworks_proto::{
    GenerateParams, LoadParams, Request, Response, StopCondition, channel::SecureChannel,
};
use lineworks_server::{
    ProcessEngine, ServerConfig,
    connection::{INCORRECT_KEY, INVALID_REQUEST},
};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const STEP: Duration = Duration::from_secs(5);

fn factory(engine: ScriptedEngine) -> impl Fn() -> Box<dyn InferenceEngine> + Send + Sync + 'static {
    move || -> Box<dyn InferenceEngine> { Box::new(engine.clone()) }
}

fn scheme() -> Arc<CryptoScheme> {
    Arc::new(CryptoScheme::derive_with_iterations(TEST_SECRET, TEST_KDF_ITERATIONS))
}

async fn next(channel: &mut TestChannel) -> Response {
    timeout(STEP, channel.recv::<Response>())
        .await
        .expect("timed out waiting for a response")
        .expect("connection closed")
        .expect("response did not open")
}

async fn until_terminal(channel: &mut TestChannel) -> Vec<Response> {
    let mut responses = Vec::new();
    loop {
        let response = next(channel).await;
        let terminal = response.is_terminal();
        responses.push(response);
        if terminal {
            return responses;
        }
    }
}

async fn load(channel: &mut TestChannel) {
    channel.send(&Request::Load(LoadParams::new("tiny"))).await.unwrap();
    assert_eq!(until_terminal(channel).await, vec![Response::status("loading"), Response::Done]);
}

#[tokio::test]
async fn options_lists_engine_models() {
    let engine = ScriptedEngine::new(["x"]).with_models(["small", "large"]);
    let server = TestServer::start(factory(engine)).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    channel.send(&Request::Options).await.unwrap();

    assert_eq!(next(&mut channel).await, Response::Options {
        models: vec!["small".into(), "large".into()],
        device: Some("cpu".into()),
    });
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn load_then_generate_until_line_end() {
    let engine = ScriptedEngine::new(["The cat", " sat.\nThen", " it slept."]);
    let server = TestServer::start(factory(engine)).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    load(&mut channel).await;
    let params = GenerateParams::new("Once").with_stop_condition(StopCondition::Line);
    channel.send(&Request::Generate(params)).await.unwrap();
    let responses = until_terminal(&mut channel).await;

    check_generation(&responses).unwrap();
    let transcript = Transcript::new(&responses);
    assert_eq!(transcript.statuses(), vec!["generating"]);
    assert_eq!(transcript.streamed(), vec!["The cat", " sat.\n"]);
    assert_eq!(transcript.terminal(), Some(&Response::Done));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn generate_without_load_is_an_error() {
    let server = TestServer::start(factory(ScriptedEngine::new(["x"]))).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    channel.send(&Request::Generate(GenerateParams::new("hi"))).await.unwrap();

    assert_eq!(next(&mut channel).await, Response::error("no model loaded"));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn abort_reaches_generation_streaming_at_full_speed() {
    const BUDGET: u32 = 3_000_000;

    let engine = ScriptedEngine::new(["tick "]).endless();
    let server = TestServer::start(factory(engine.clone())).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    load(&mut channel).await;
    let params = GenerateParams::new("").with_max_tokens(BUDGET);
    channel.send(&Request::Generate(params)).await.unwrap();

    let mut responses = Vec::new();
    for _ in 0..3 {
        responses.push(next(&mut channel).await);
    }

    // The engine never waits, so responses are always pending on the server.
    channel.send(&Request::Abort).await.unwrap();
    responses.extend(until_terminal(&mut channel).await);

    let transcript = Transcript::new(&responses);
    assert_eq!(transcript.terminal(), Some(&Response::Aborted));
    assert!(transcript.output().unwrap().errored);
    assert!(
        engine.pulled() < BUDGET as usize / 10,
        "abort applied after {} fragments",
        engine.pulled()
    );
    check_generation(&responses).unwrap();
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn abort_interrupts_generation() {
    let engine = ScriptedEngine::new(["tick "]).endless().with_delay(Duration::from_millis(10));
    let server = TestServer::start(factory(engine)).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    load(&mut channel).await;
    let params = GenerateParams::new("").with_max_tokens(100_000);
    channel.send(&Request::Generate(params)).await.unwrap();

    let mut responses = vec![next(&mut channel).await, next(&mut channel).await];
    assert!(matches!(responses[1], Response::Stream { .. }));

    channel.send(&Request::Abort).await.unwrap();
    responses.extend(until_terminal(&mut channel).await);

    check_generation(&responses).unwrap();
    let transcript = Transcript::new(&responses);
    assert_eq!(transcript.terminal(), Some(&Response::Aborted));
    assert!(transcript.output().unwrap().errored);

    // The connection is still usable afterwards.
    channel.send(&Request::Options).await.unwrap();
    assert!(matches!(next(&mut channel).await, Response::Options { .. }));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn wrong_key_is_reported_and_connection_survives() {
    let server = TestServer::start(factory(ScriptedEngine::new(["x"]))).await.unwrap();
    let mut intruder = connect_channel(server.addr(), "not the key").await.unwrap();

    intruder.send(&Request::Options).await.unwrap();

    // The reply is sealed with the server's key, which the intruder lacks.
    let reply = timeout(STEP, intruder.recv::<Response>()).await.unwrap().unwrap();
    assert!(reply.unwrap_err().is_key_mismatch());

    let mut ws = connect_raw(server.addr()).await.unwrap();
    ws.send(Message::Binary(vec![7u8; 64])).await.unwrap();
    let mut channel = SecureChannel::new(ws, scheme());

    assert_eq!(next(&mut channel).await, Response::error(INCORRECT_KEY));
    channel.send(&Request::Options).await.unwrap();
    assert!(matches!(next(&mut channel).await, Response::Options { .. }));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn text_message_is_invalid_request() {
    let server = TestServer::start(factory(ScriptedEngine::new(["x"]))).await.unwrap();
    let mut ws = connect_raw(server.addr()).await.unwrap();

    ws.send(Message::Text("{\"type\": \"options\"}".into())).await.unwrap();
    let mut channel = SecureChannel::new(ws, scheme());

    assert_eq!(next(&mut channel).await, Response::error(INVALID_REQUEST));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn authentic_but_malformed_request_is_invalid() {
    let server = TestServer::start(factory(ScriptedEngine::new(["x"]))).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    // A response document is not a request.
    channel.send(&Response::Done).await.unwrap();

    assert_eq!(next(&mut channel).await, Response::error(INVALID_REQUEST));
    channel.send(&Request::Options).await.unwrap();
    assert!(matches!(next(&mut channel).await, Response::Options { .. }));
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn large_responses_are_fragmented() {
    let engine = ScriptedEngine::new(["word ".repeat(2_000)]);
    let config = ServerConfig { fragment_size: 256, ..test_config() };
    let server = TestServer::start_with(config, factory(engine)).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    load(&mut channel).await;
    channel.send(&Request::Generate(GenerateParams::new(""))).await.unwrap();
    let responses = until_terminal(&mut channel).await;

    check_generation(&responses).unwrap();
    assert_eq!(Transcript::new(&responses).streamed_text().len(), 10_000);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn connections_are_independent() {
    let engine = ScriptedEngine::new(["a", "b"]);
    let server = TestServer::start(factory(engine)).await.unwrap();
    let mut first = connect_channel(server.addr(), TEST_SECRET).await.unwrap();
    let mut second = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    load(&mut first).await;

    // Each connection has its own engine, so nothing is loaded here.
    second.send(&Request::Generate(GenerateParams::new(""))).await.unwrap();
    assert_eq!(next(&mut second).await, Response::error("no model loaded"));

    first.send(&Request::Generate(GenerateParams::new(""))).await.unwrap();
    check_generation(&until_terminal(&mut first).await).unwrap();
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_waits_for_busy_connections() {
    let engine = ScriptedEngine::new(["tick "]).endless().with_delay(Duration::from_millis(10));
    let server = TestServer::start(factory(engine)).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    load(&mut channel).await;
    let params = GenerateParams::new("").with_max_tokens(100_000);
    channel.send(&Request::Generate(params)).await.unwrap();
    assert_eq!(next(&mut channel).await, Response::status("generating"));

    timeout(STEP, server.shutdown()).await.unwrap().unwrap();

    // Whatever was in flight drains, then the server closes the socket.
    loop {
        match timeout(STEP, channel.recv::<Response>()).await.unwrap() {
            None | Some(Err(_)) => break,
            Some(Ok(_)) => {},
        }
    }
}

#[tokio::test]
async fn process_engine_lists_model_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.gguf"), b"").unwrap();
    fs::write(dir.path().join("a.gguf"), b"").unwrap();
    fs::write(dir.path().join("notes.txt"), b"").unwrap();

    let models = ModelDirectory::new(dir.path());
    let factory = move || -> Box<dyn InferenceEngine> {
        Box::new(ProcessEngine::new(None, models.clone()))
    };
    let server = TestServer::start(factory).await.unwrap();
    let mut channel = connect_channel(server.addr(), TEST_SECRET).await.unwrap();

    channel.send(&Request::Options).await.unwrap();
    assert_eq!(next(&mut channel).await, Response::Options {
        models: vec!["a".into(), "b".into()],
        device: None,
    });

    channel.send(&Request::Load(LoadParams::new("a"))).await.unwrap();
    let responses = until_terminal(&mut channel).await;
    assert_eq!(Transcript::new(&responses).errors(), vec![
        "failed to load model: no inference engine configured"
    ]);
    server.shutdown().await.unwrap();
}
