// nestdb-server/tests/helpers/mod.rs
// ============================================================================
// Module: Test Harness
// Description: Ephemeral-port server spawning and client conveniences.
// Purpose: Drive the real HTTP surface from end-to-end tests.
// Dependencies: nestdb-server, reqwest, serde_json, tokio
// ============================================================================

//! ## Overview
//! Binds the server on a loopback ephemeral port and serves it on a spawned
//! task; tests talk to it with reqwest exactly like a client would. The
//! default schema accepts any JSON object and rejects everything else, so
//! schema-rejection paths are testable.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only helpers; not every suite uses every helper."
)]

use nestdb_server::AppState;
use nestdb_server::SchemaGate;
use serde_json::Value;
use serde_json::json;

/// A running server and the state behind it.
pub struct TestServer {
    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub base: String,
    /// Shared state, for direct fixture setup (token installs).
    pub state: AppState,
}

/// Spawns a server whose schema accepts any JSON object.
pub async fn spawn() -> TestServer {
    spawn_with_schema(json!({"type": "object"})).await
}

/// Spawns a server with the given document schema.
pub async fn spawn_with_schema(schema: Value) -> TestServer {
    let gate = SchemaGate::compile(&schema).expect("schema compiles");
    let state = AppState::new(gate);
    let listener =
        tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let serve_state = state.clone();
    tokio::spawn(async move {
        let _ = nestdb_server::serve_on(serve_state, listener).await;
    });
    TestServer {
        base: format!("http://{addr}"),
        state,
    }
}

/// Logs in and returns a bearer token.
pub async fn login(client: &reqwest::Client, base: &str) -> String {
    let response = client
        .post(format!("{base}/auth"))
        .json(&json!({"username": "tester"}))
        .send()
        .await
        .expect("login request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.expect("login body");
    body["token"].as_str().expect("token").to_string()
}

/// `Authorization` header value for a token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Reads SSE chunks into `buffer` until `needle` appears or the timeout
/// elapses; panics on timeout so the failure names the missing frame.
pub async fn read_sse_until(response: &mut reqwest::Response, buffer: &mut String, needle: &str) {
    let deadline = std::time::Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        while !buffer.contains(needle) {
            match response.chunk().await.expect("sse chunk") {
                Some(chunk) => buffer.push_str(&String::from_utf8_lossy(&chunk)),
                None => panic!("sse stream ended before {needle:?}; got {buffer:?}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got {buffer:?}"));
}
