//! Cache Entry Module
//!
//! Defines stored responses and the entries that hold them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Response Payload ==
/// A response as seen by the caller: status, headers and raw body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// HTTP status code
    pub status: u16,
    /// Header name/value pairs in arrival order
    pub headers: Vec<(String, String)>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl ResponsePayload {
    // == Constructors ==
    /// Creates a response with no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Creates a `text/plain` response.
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(status, body).with_header("content-type", "text/plain; charset=utf-8")
    }

    /// Creates an `application/json` response from a JSON value.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string()).with_header("content-type", "application/json")
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    // == Accessors ==
    /// Returns true for a 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the first header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text, lossy.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// == Cache Entry ==
/// A stored response keyed by request identity within one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Request identity, `METHOD normalized-url`
    pub key: String,
    /// The stored response
    pub payload: ResponsePayload,
    /// When the entry was written
    pub stored_at: DateTime<Utc>,
    /// Generation the entry was written into
    pub generation: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_response_sets_content_type() {
        let resp = ResponsePayload::text(503, "Image not available offline");
        assert_eq!(resp.status, 503);
        assert_eq!(resp.header("Content-Type"), Some("text/plain; charset=utf-8"));
        assert_eq!(resp.body_text(), "Image not available offline");
    }

    #[test]
    fn test_json_response_body() {
        let resp = ResponsePayload::json(503, &json!({ "offline": true }));
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["offline"], true);
        assert!(!resp.is_ok());
    }

    #[test]
    fn test_is_ok_boundaries() {
        assert!(ResponsePayload::new(200, "").is_ok());
        assert!(ResponsePayload::new(204, "").is_ok());
        assert!(!ResponsePayload::new(199, "").is_ok());
        assert!(!ResponsePayload::new(300, "").is_ok());
    }
}
