//! Scripted Network
//!
//! In-process `Network` whose answers are set up ahead of time. Lets the
//! orchestrator be exercised with no real connectivity.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::cache::ResponsePayload;
use crate::error::FetchError;
use crate::network::{resolve_url, FetchRequest, Network};

/// How one route answers.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(ResponsePayload),
    Fail,
    /// Never settles
    Stall,
}

/// Network double keyed by `METHOD absolute-url`.
///
/// One-shot scripts queued with [`ScriptedNetwork::push`] are consumed first,
/// in order; after that the standing route applies. Unknown routes answer 404.
#[derive(Debug)]
pub struct ScriptedNetwork {
    origin: Url,
    online: AtomicBool,
    routes: Mutex<HashMap<String, Scripted>>,
    once: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<FetchRequest>>,
}

impl ScriptedNetwork {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            online: AtomicBool::new(true),
            routes: Mutex::new(HashMap::new()),
            once: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Toggles connectivity. While offline every call fails.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Sets the standing answer for a route.
    pub fn route(&self, method: &str, url: &str, script: Scripted) {
        let key = self.key(method, url);
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(key, script);
        }
    }

    /// Standing 200 text answer for a GET.
    pub fn serve(&self, url: &str, body: &str) {
        self.route("GET", url, Scripted::Respond(ResponsePayload::text(200, body)));
    }

    /// Queues a one-shot answer ahead of the standing route.
    pub fn push(&self, method: &str, url: &str, script: Scripted) {
        let key = self.key(method, url);
        if let Ok(mut once) = self.once.lock() {
            once.entry(key).or_default().push_back(script);
        }
    }

    /// Every call made so far, including failed ones.
    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls made to one route.
    pub fn call_count(&self, method: &str, url: &str) -> usize {
        let key = self.key(method, url);
        self.calls()
            .iter()
            .filter(|c| format!("{} {}", c.method, c.url) == key)
            .count()
    }

    fn key(&self, method: &str, url: &str) -> String {
        let resolved = resolve_url(url, &self.origin)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        format!("{} {}", method.to_ascii_uppercase(), resolved)
    }

    fn next_script(&self, key: &str) -> Option<Scripted> {
        let from_once = self
            .once
            .lock()
            .ok()
            .and_then(|mut once| once.get_mut(key).and_then(|q| q.pop_front()));
        from_once.or_else(|| self.routes.lock().ok().and_then(|r| r.get(key).cloned()))
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: FetchRequest) -> Result<ResponsePayload, FetchError> {
        let key = format!("{} {}", request.method.to_ascii_uppercase(), request.url);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }

        if !self.online.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable("offline".to_string()));
        }

        match self.next_script(&key) {
            Some(Scripted::Respond(payload)) => Ok(payload),
            Some(Scripted::Fail) => Err(FetchError::Unreachable(format!("scripted failure for {}", key))),
            Some(Scripted::Stall) => std::future::pending().await,
            None => Ok(ResponsePayload::text(404, "Not Found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> ScriptedNetwork {
        ScriptedNetwork::new(Url::parse("http://localhost:8080").unwrap())
    }

    #[tokio::test]
    async fn test_one_shot_scripts_run_before_standing_route() {
        let net = network();
        net.serve("/api/menu", "standing");
        net.push("GET", "/api/menu", Scripted::Fail);

        let url = Url::parse("http://localhost:8080/api/menu").unwrap();
        assert!(net.fetch(FetchRequest::get(url.clone())).await.is_err());
        let second = net.fetch(FetchRequest::get(url)).await.unwrap();
        assert_eq!(second.body_text(), "standing");
        assert_eq!(net.call_count("GET", "/api/menu"), 2);
    }

    #[tokio::test]
    async fn test_offline_fails_everything() {
        let net = network();
        net.serve("/", "home");
        net.set_online(false);

        let url = Url::parse("http://localhost:8080/").unwrap();
        assert!(matches!(
            net.fetch(FetchRequest::get(url)).await,
            Err(FetchError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let net = network();
        let url = Url::parse("http://localhost:8080/missing").unwrap();
        assert_eq!(net.fetch(FetchRequest::get(url)).await.unwrap().status, 404);
    }
}
