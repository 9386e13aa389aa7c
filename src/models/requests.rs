//! Request DTOs for the orchestrator API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::network::RequestDescriptor;

/// Longest URL accepted on the interception boundary.
const MAX_URL_LENGTH: usize = 8192;

/// Request body for POST /notification/click
#[derive(Debug, Clone, Deserialize)]
pub struct ClickRequest {
    /// Action identifier chosen on the alert (`view`, `dismiss`)
    pub action: String,
}

impl ClickRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.action.trim().is_empty() {
            return Some("Action cannot be empty".to_string());
        }
        None
    }
}

/// Validates an intercepted request body (POST /fetch).
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_fetch(request: &RequestDescriptor) -> Option<String> {
    if request.method.trim().is_empty() {
        return Some("Method cannot be empty".to_string());
    }
    if request.url.trim().is_empty() {
        return Some("URL cannot be empty".to_string());
    }
    if request.url.len() > MAX_URL_LENGTH {
        return Some(format!(
            "URL exceeds maximum length of {} characters",
            MAX_URL_LENGTH
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_request_deserialize_defaults() {
        let json = r#"{"method": "GET", "url": "/menu.html"}"#;
        let req: RequestDescriptor = serde_json::from_str(json).unwrap();
        assert!(!req.is_navigation);
        assert!(req.body.is_none());
        assert!(validate_fetch(&req).is_none());
    }

    #[test]
    fn test_validate_empty_url() {
        let req = RequestDescriptor::get("");
        assert!(validate_fetch(&req).is_some());
    }

    #[test]
    fn test_validate_overlong_url() {
        let req = RequestDescriptor::get(format!("/{}", "a".repeat(MAX_URL_LENGTH)));
        assert!(validate_fetch(&req).is_some());
    }

    #[test]
    fn test_click_request() {
        let req: ClickRequest = serde_json::from_str(r#"{"action": "view"}"#).unwrap();
        assert!(req.validate().is_none());
        let empty = ClickRequest {
            action: " ".to_string(),
        };
        assert!(empty.validate().is_some());
    }
}
