//! Network Module
//!
//! The seam between the orchestrator and real connectivity.

mod http;
mod request;
#[cfg(any(test, feature = "test-util"))]
mod scripted;

use std::time::Duration;

use async_trait::async_trait;

use crate::cache::ResponsePayload;
use crate::error::FetchError;

pub use http::HttpNetwork;
pub use request::{cache_key, normalize_url, resolve_url, FetchRequest, RequestDescriptor};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::{Scripted, ScriptedNetwork};

// == Network Trait ==
/// Anything that can perform a fetch.
///
/// An HTTP error status is an `Ok` response; only connectivity problems are
/// reported as `FetchError`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<ResponsePayload, FetchError>;
}

// == Bounded Fetch ==
/// Races a fetch against `limit`; expiry is reported as a connectivity failure.
pub async fn fetch_within(
    network: &dyn Network,
    request: FetchRequest,
    limit: Duration,
) -> Result<ResponsePayload, FetchError> {
    match tokio::time::timeout(limit, network.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::TimedOut(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[tokio::test]
    async fn test_stalled_fetch_times_out() {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let net = ScriptedNetwork::new(origin.clone());
        net.route("GET", "/slow", Scripted::Stall);

        let request = FetchRequest::get(origin.join("/slow").unwrap());
        let result = fetch_within(&net, request, Duration::from_millis(50)).await;

        assert_eq!(result, Err(FetchError::TimedOut(Duration::from_millis(50))));
    }

    #[tokio::test]
    async fn test_fast_fetch_passes_through() {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let net = ScriptedNetwork::new(origin.clone());
        net.serve("/fast", "ok");

        let request = FetchRequest::get(origin.join("/fast").unwrap());
        let result = fetch_within(&net, request, Duration::from_secs(1)).await.unwrap();

        assert_eq!(result.body_text(), "ok");
    }
}
