// nestdb-server/src/sse.rs
// ============================================================================
// Module: SSE Transport
// Description: Server-sent event streams for subscription mode.
// Purpose: Turn a subscriber's event queue into a keep-alive SSE response.
// Dependencies: axum, nestdb-core, tokio-stream
// ============================================================================

//! ## Overview
//! A subscription GET upgrades the response to `text/event-stream`. Update
//! events carry a document's JSON view, delete events carry the deleted
//! request path as a JSON string; both are stamped with an epoch-millisecond
//! id. A comment frame every 15 seconds keeps idle connections alive. The
//! stream ends when the subscriber's queue closes (resource deleted) or the
//! client disconnects, which drops the receiver and lets the producer side
//! prune the subscriber.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::http::header::CACHE_CONTROL;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::response::sse::Sse;
use nestdb_core::json::now_ms;
use nestdb_core::subscribe::SubscriberEvent;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Idle interval between keep-alive comment frames.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

// ============================================================================
// SECTION: Stream Construction
// ============================================================================

/// Builds the SSE response for a registered subscriber.
pub fn subscription_response(rx: UnboundedReceiver<SubscriberEvent>) -> Response {
    let stream = UnboundedReceiverStream::new(rx)
        .map(|event| Ok::<Event, Infallible>(encode_event(&event)));
    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
        .into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// Encodes one subscriber event as an SSE frame.
fn encode_event(event: &SubscriberEvent) -> Event {
    match event {
        SubscriberEvent::Update(payload) => {
            Event::default().event("update").data(payload).id(now_ms().to_string())
        }
        SubscriberEvent::Delete(path) => Event::default()
            .event("delete")
            .data(format!("\"{path}\""))
            .id(now_ms().to_string()),
    }
}
