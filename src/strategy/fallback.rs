//! Synthesized Responses
//!
//! Placeholders served when neither the network nor the cache can answer.

use serde_json::json;
use uuid::Uuid;

use crate::cache::ResponsePayload;

pub const API_OFFLINE_ERROR: &str = "Service unavailable offline";
pub const IMAGE_OFFLINE_BODY: &str = "Image not available offline";

const OFFLINE_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Offline</title></head>\
<body><h1>You are offline</h1><p>This page has not been saved for offline use yet.</p></body></html>";

/// JSON 503 for an API GET with no cached copy.
pub fn api_offline() -> ResponsePayload {
    ResponsePayload::json(
        503,
        &json!({
            "error": API_OFFLINE_ERROR,
            "offline": true
        }),
    )
}

/// Plain-text 503 for an image with no cached copy.
pub fn image_offline() -> ResponsePayload {
    ResponsePayload::text(503, IMAGE_OFFLINE_BODY)
}

/// Last resort for navigations when even the app shell is missing.
pub fn offline_page() -> ResponsePayload {
    ResponsePayload::new(503, OFFLINE_PAGE).with_header("content-type", "text/html; charset=utf-8")
}

/// 202 acknowledgement for a mutating request parked in the offline queue.
pub fn queued(id: Uuid) -> ResponsePayload {
    ResponsePayload::json(
        202,
        &json!({
            "queued": true,
            "offline": true,
            "id": id
        }),
    )
}
