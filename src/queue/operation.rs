//! Queued Operation Module
//!
//! Mutating requests deferred until connectivity returns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::network::RequestDescriptor;

// == Operation Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    InFlight,
    /// Confirmed by a 2xx response; the row is removed right after
    Delivered,
    /// Retry budget exhausted; kept for inspection, never retried
    Dead,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::InFlight => "IN_FLIGHT",
            OperationStatus::Delivered => "DELIVERED",
            OperationStatus::Dead => "DEAD",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OperationStatus::Pending),
            "IN_FLIGHT" => Ok(OperationStatus::InFlight),
            "DELIVERED" => Ok(OperationStatus::Delivered),
            "DEAD" => Ok(OperationStatus::Dead),
            other => Err(Error::Internal(format!("Unknown operation status: {}", other))),
        }
    }
}

// == Operation Payload ==
/// What to send once back online.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPayload {
    pub method: String,
    /// URL as the application wrote it; resolved at delivery time
    pub target: String,
    pub body: Option<String>,
    pub content_type: Option<String>,
}

impl OperationPayload {
    pub fn from_request(request: &RequestDescriptor) -> Self {
        Self {
            method: request.method(),
            target: request.url.clone(),
            body: request.body.clone(),
            content_type: request.content_type.clone(),
        }
    }

    /// A JSON POST.
    pub fn post_json(target: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            target: target.into(),
            body: Some(body.into()),
            content_type: Some("application/json".to_string()),
        }
    }
}

// == Queued Operation ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueuedOperation {
    pub id: Uuid,
    pub payload: OperationPayload,
    pub attempts: u32,
    pub status: OperationStatus,
    pub enqueued_at: DateTime<Utc>,
    /// Reason for the most recent failed attempt
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            OperationStatus::Pending,
            OperationStatus::InFlight,
            OperationStatus::Delivered,
            OperationStatus::Dead,
        ] {
            assert_eq!(status.as_str().parse::<OperationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&OperationStatus::InFlight).unwrap();
        assert_eq!(json, "\"IN_FLIGHT\"");
    }

    #[test]
    fn test_payload_from_request() {
        let request = RequestDescriptor::post_json("/api/orders", "{}");
        let payload = OperationPayload::from_request(&request);
        assert_eq!(payload, OperationPayload::post_json("/api/orders", "{}"));
    }
}
