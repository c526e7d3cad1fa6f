// nestdb-server/tests/api.rs
// ============================================================================
// Module: HTTP API Tests
// Description: End-to-end scenarios over the full request surface.
// Purpose: Validate database, document, and collection lifecycles over HTTP.
// Dependencies: nestdb-server, reqwest, serde_json, tokio
// ============================================================================

//! ## Overview
//! Drives the documented scenarios against a real listener: database
//! create/list/delete, document put/get/patch/post/delete with metadata
//! stamping, nested collection lifecycle, conditional PUT, schema
//! rejection, and malformed-path handling.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

mod helpers;

use helpers::bearer;
use helpers::login;
use helpers::spawn;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use serde_json::json;

/// Verifies database create, duplicate rejection, listing, and deletion.
#[tokio::test]
async fn database_lifecycle() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    let response = client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body, json!({"uri": "/v1/db1"}));

    let response = client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db again");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .get(format!("{}/v1/db1/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("list db");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body, json!([]));

    let response = client
        .delete(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("delete db");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .delete(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("delete db again");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Verifies document put/get with metadata, and overwrite status codes.
#[tokio::test]
async fn document_put_get_roundtrip() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");

    let response = client
        .put(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"prop": 100}))
        .send()
        .await
        .expect("put doc");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body, json!({"uri": "/v1/db1/doc1"}));

    let response = client
        .put(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"prop": 200}))
        .send()
        .await
        .expect("overwrite doc");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("get doc");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body["path"], json!("/doc1"));
    assert_eq!(body["doc"], json!({"prop": 200}));
    assert_eq!(body["meta"]["createdBy"], json!("tester"));
    assert_eq!(body["meta"]["lastModifiedBy"], json!("tester"));
    let created_at = body["meta"]["createdAt"].as_i64().expect("createdAt");
    let modified_at = body["meta"]["lastModifiedAt"].as_i64().expect("lastModifiedAt");
    assert!(created_at <= modified_at);

    let response = client
        .get(format!("{}/v1/db1/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("list db");
    let body: Value = response.json().await.expect("body");
    assert_eq!(body.as_array().map(Vec::len), Some(1));
}

/// Verifies the patch flow: success envelope, then structural failure.
#[tokio::test]
async fn document_patch_flow() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");
    client
        .put(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"prop": 100}))
        .send()
        .await
        .expect("put doc");

    let response = client
        .patch(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!([{"op": "ObjectAdd", "path": "/a", "value": 100}]))
        .send()
        .await
        .expect("patch doc");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("body");
    assert_eq!(
        body,
        json!({"uri": "/v1/db1/doc1", "patchFailed": false, "message": "patches applied"})
    );

    // /a now holds a number; ArrayAdd through it must fail structurally.
    let response = client
        .patch(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!([{"op": "ArrayAdd", "path": "/a", "value": 1}]))
        .send()
        .await
        .expect("patch doc");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body["patchFailed"], json!(true));

    let response = client
        .get(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("get doc");
    let body: Value = response.json().await.expect("body");
    assert_eq!(body["doc"], json!({"prop": 100, "a": 100}));

    let response = client
        .patch(format!("{}/v1/db1/missing", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!([{"op": "ObjectAdd", "path": "/a", "value": 1}]))
        .send()
        .await
        .expect("patch missing doc");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Verifies POST creates a 32-hex-named document readable at its uri.
#[tokio::test]
async fn post_creates_randomly_named_document() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");

    let response = client
        .post(format!("{}/v1/db1/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"posted": true}))
        .send()
        .await
        .expect("post doc");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("body");
    let uri = body["uri"].as_str().expect("uri");
    let name = uri.strip_prefix("/v1/db1/").expect("uri under collection");
    assert_eq!(name.len(), 32);
    assert!(name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let response = client
        .get(format!("{}{uri}", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("get posted doc");
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("body");
    assert_eq!(body["doc"], json!({"posted": true}));
}

/// Verifies nested collection create, use, and delete.
#[tokio::test]
async fn nested_collection_lifecycle() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");
    client
        .put(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({}))
        .send()
        .await
        .expect("put doc");

    let response = client
        .put(format!("{}/v1/db1/doc1/col/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put collection");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .put(format!("{}/v1/db1/doc1/col/doc2", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"nested": true}))
        .send()
        .await
        .expect("put nested doc");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .get(format!("{}/v1/db1/doc1/col/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("list collection");
    let body: Value = response.json().await.expect("body");
    assert_eq!(body[0]["path"], json!("/doc1/col/doc2"));

    let response = client
        .delete(format!("{}/v1/db1/doc1/col/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("delete collection");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .delete(format!("{}/v1/db1/doc1/col/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("delete collection again");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Verifies the conditional PUT precondition returns 412 on mismatch.
#[tokio::test]
async fn conditional_put_precondition() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");
    client
        .put(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"v": 1}))
        .send()
        .await
        .expect("put doc");

    let response = client
        .get(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("get doc");
    let body: Value = response.json().await.expect("body");
    let modified_at = body["meta"]["lastModifiedAt"].as_i64().expect("lastModifiedAt");

    let response = client
        .put(format!("{}/v1/db1/doc1?timestamp={}", server.base, modified_at - 1))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"v": 2}))
        .send()
        .await
        .expect("stale put");
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = client
        .put(format!("{}/v1/db1/doc1?timestamp={modified_at}", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"v": 2}))
        .send()
        .await
        .expect("matching put");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .put(format!("{}/v1/db1/doc1?timestamp=nonsense", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"v": 3}))
        .send()
        .await
        .expect("bad timestamp");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Verifies overwriting a document removes its nested collections.
#[tokio::test]
async fn put_overwrite_drops_nested_collections() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");
    client
        .put(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({}))
        .send()
        .await
        .expect("put doc");
    client
        .put(format!("{}/v1/db1/doc1/col/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put collection");

    client
        .put(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!({"replaced": true}))
        .send()
        .await
        .expect("overwrite doc");

    let response = client
        .get(format!("{}/v1/db1/doc1/col/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("list dropped collection");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Verifies malformed paths map onto 400 and missing resources onto 404.
#[tokio::test]
async fn path_errors() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");

    // GET on the slashless database form is not supported.
    let response = client
        .get(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("get db without slash");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A document path with a trailing slash is malformed.
    let response = client
        .get(format!("{}/v1/db1/doc1/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("get malformed path");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing database.
    let response = client
        .get(format!("{}/v1/missing/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("get missing db");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Verifies schema-nonconforming bodies are rejected on PUT and POST.
#[tokio::test]
async fn schema_rejection() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    client
        .put(format!("{}/v1/db1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("put db");

    // The test schema requires objects; an array must be rejected.
    let response = client
        .put(format!("{}/v1/db1/doc1", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .json(&json!([1, 2, 3]))
        .send()
        .await
        .expect("put non-object");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/v1/db1/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .body("not json")
        .send()
        .await
        .expect("post malformed json");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .get(format!("{}/v1/db1/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("list db");
    let body: Value = response.json().await.expect("body");
    assert_eq!(body, json!([]));
}

/// Verifies OPTIONS answers with the allow list and CORS headers, no auth.
#[tokio::test]
async fn options_preflight() {
    let server = spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{}/v1/db1", server.base))
        .send()
        .await
        .expect("options");
    assert_eq!(response.status(), StatusCode::OK);
    let allow = response.headers().get("Allow").expect("allow header");
    assert_eq!(allow, "GET,PUT,POST,PATCH,DELETE,OPTIONS");
    let origin = response.headers().get("Access-Control-Allow-Origin").expect("cors header");
    assert_eq!(origin, "*");
}

/// Verifies unsupported methods are a 400, not a router-level 405.
#[tokio::test]
async fn unsupported_method_rejected() {
    let server = spawn().await;
    let client = reqwest::Client::new();
    let token = login(&client, &server.base).await;

    let response = client
        .request(reqwest::Method::HEAD, format!("{}/v1/db1/", server.base))
        .header(AUTHORIZATION, bearer(&token))
        .send()
        .await
        .expect("head");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
