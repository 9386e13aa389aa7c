//! Strategy Engine
//!
//! Runs the per-class fetch strategy against the current generations and
//! the network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheStore, InterceptStats, ResponsePayload};
use crate::error::{FetchError, Result};
use crate::lifecycle::{GenerationView, LifecycleController};
use crate::network::{cache_key, fetch_within, Network, RequestDescriptor};
use crate::queue::{OfflineQueue, OperationPayload};
use crate::strategy::{fallback, RequestClass, RequestClassifier};

/// App shell entries tried, in order, when a navigation has no cached copy.
const APP_SHELL_KEYS: &[&str] = &["GET /index.html", "GET /"];

/// Endpoint refreshed by the periodic menu update.
pub const MENU_ENDPOINT: &str = "/api/menu";

// == Served From ==
/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedFrom {
    Network,
    /// Cache-first hit
    Cache,
    /// Cached copy served after a network failure
    Fallback,
    /// Synthesized placeholder
    Offline,
    /// Parked in the offline queue
    Queued,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Network => "network",
            ServedFrom::Cache => "cache",
            ServedFrom::Fallback => "fallback",
            ServedFrom::Offline => "offline",
            ServedFrom::Queued => "queued",
        }
    }
}

/// A resolved interception.
#[derive(Debug, Clone)]
pub struct Handled {
    pub class: RequestClass,
    pub source: ServedFrom,
    pub response: ResponsePayload,
}

type Served = (ServedFrom, ResponsePayload);

// == Strategy Engine ==
pub struct StrategyEngine {
    store: CacheStore,
    network: Arc<dyn Network>,
    lifecycle: Arc<LifecycleController>,
    queue: Arc<OfflineQueue>,
    classifier: RequestClassifier,
    origin: Url,
    timeout: Duration,
    stats: Mutex<InterceptStats>,
}

impl StrategyEngine {
    // == Constructor ==
    pub fn new(
        store: CacheStore,
        network: Arc<dyn Network>,
        lifecycle: Arc<LifecycleController>,
        queue: Arc<OfflineQueue>,
        classifier: RequestClassifier,
        origin: Url,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            network,
            lifecycle,
            queue,
            classifier,
            origin,
            timeout,
            stats: Mutex::new(InterceptStats::new()),
        }
    }

    // == Handle ==
    /// Resolves one intercepted request.
    ///
    /// Only `static-asset` and `default` requests can fail, and only when the
    /// network failed and no cached copy exists. Every other class resolves
    /// to a real or synthesized response.
    pub async fn handle(&self, request: &RequestDescriptor) -> Result<Handled> {
        let class = self.classifier.classify(request);
        let url = request.resolve(&self.origin)?;
        let key = cache_key(&request.method(), &url, &self.origin);
        debug!(%key, %class, "Intercepted request");

        // Held until the response is settled so activation cannot sweep a
        // generation this request is reading.
        let view = self.lifecycle.view().await;

        let outcome = match class {
            RequestClass::Navigation => self.navigation(&view, request, &key).await,
            RequestClass::StaticAsset => self.static_asset(&view, request, &key).await,
            RequestClass::DynamicAsset => self.dynamic_asset(&view, request, &key).await,
            RequestClass::Api => self.api(&view, request, &key).await,
            RequestClass::Default => self.default(&view, request, &key, &url).await,
        };
        drop(view);

        match outcome {
            Ok((source, response)) => {
                self.record(|stats| match source {
                    ServedFrom::Network => stats.record_network(),
                    ServedFrom::Cache => {}
                    ServedFrom::Fallback => stats.record_fallback(),
                    ServedFrom::Offline => stats.record_synthesized(),
                    ServedFrom::Queued => stats.record_enqueued(),
                });
                Ok(Handled {
                    class,
                    source,
                    response,
                })
            }
            Err(e) => {
                self.record(|stats| stats.record_failure());
                warn!(%key, %class, error = %e, "No fallback available");
                Err(e)
            }
        }
    }

    // == Strategies ==
    /// Network first, then the cached page, then the app shell.
    async fn navigation(
        &self,
        view: &GenerationView<'_>,
        request: &RequestDescriptor,
        key: &str,
    ) -> Result<Served> {
        let error = match self.fetch(request).await {
            Ok(response) => return Ok((ServedFrom::Network, response)),
            Err(e) => e,
        };
        warn!(%key, error = %error, "Navigation offline, falling back to cache");

        if let Some(cached) = self.lookup(view.current_static(), key) {
            return Ok((ServedFrom::Fallback, cached));
        }
        for shell in APP_SHELL_KEYS {
            if let Some(cached) = self.lookup(view.current_static(), shell) {
                return Ok((ServedFrom::Fallback, cached));
            }
        }
        Ok((ServedFrom::Offline, fallback::offline_page()))
    }

    /// Cache first; a miss is fetched and written into the STATIC generation.
    async fn static_asset(
        &self,
        view: &GenerationView<'_>,
        request: &RequestDescriptor,
        key: &str,
    ) -> Result<Served> {
        if let Some(cached) = self.lookup(view.current_static(), key) {
            return Ok((ServedFrom::Cache, cached));
        }

        let response = self.fetch(request).await?;
        if response.is_ok() {
            self.remember(view.current_static(), key, &response);
        }
        Ok((ServedFrom::Network, response))
    }

    /// Cache first; only 200s are stored; failures degrade to a placeholder.
    async fn dynamic_asset(
        &self,
        view: &GenerationView<'_>,
        request: &RequestDescriptor,
        key: &str,
    ) -> Result<Served> {
        if let Some(cached) = self.lookup(view.current_dynamic(), key) {
            return Ok((ServedFrom::Cache, cached));
        }

        match self.fetch(request).await {
            Ok(response) => {
                if response.status == 200 {
                    self.remember(view.current_dynamic(), key, &response);
                }
                Ok((ServedFrom::Network, response))
            }
            Err(e) => {
                warn!(%key, error = %e, "Image unavailable offline");
                Ok((ServedFrom::Offline, fallback::image_offline()))
            }
        }
    }

    /// Network first; GET responses refresh the DYNAMIC generation and are
    /// the fallback when offline.
    async fn api(
        &self,
        view: &GenerationView<'_>,
        request: &RequestDescriptor,
        key: &str,
    ) -> Result<Served> {
        match self.fetch(request).await {
            Ok(response) => {
                if request.is_get() && response.status == 200 {
                    self.remember(view.current_dynamic(), key, &response);
                }
                Ok((ServedFrom::Network, response))
            }
            Err(e) => {
                warn!(%key, error = %e, "API offline");
                if request.is_get() {
                    if let Some(cached) = self.lookup(view.current_dynamic(), key) {
                        return Ok((ServedFrom::Fallback, cached));
                    }
                }
                Ok((ServedFrom::Offline, fallback::api_offline()))
            }
        }
    }

    /// Network first with a STATIC fallback for GETs. Mutating API calls
    /// that fail for connectivity reasons are queued instead.
    async fn default(
        &self,
        view: &GenerationView<'_>,
        request: &RequestDescriptor,
        key: &str,
        url: &Url,
    ) -> Result<Served> {
        let error = match self.fetch(request).await {
            Ok(response) => return Ok((ServedFrom::Network, response)),
            Err(e) => e,
        };

        if !request.is_get() {
            let connectivity = !matches!(error, FetchError::InvalidRequest(_));
            if connectivity && self.classifier.is_api(url) {
                let id = self.queue.enqueue(OperationPayload::from_request(request))?;
                return Ok((ServedFrom::Queued, fallback::queued(id)));
            }
            return Err(error.into());
        }

        match self.lookup(view.current_static(), key) {
            Some(cached) => Ok((ServedFrom::Fallback, cached)),
            None => Err(error.into()),
        }
    }

    // == Menu Refresh ==
    /// Re-fetches the menu into the current DYNAMIC generation.
    ///
    /// Returns whether a fresh copy was stored. Failures are logged only.
    pub async fn refresh_menu(&self) -> Result<bool> {
        let view = self.lifecycle.view().await;
        let Some(dynamic) = view.current_dynamic() else {
            debug!("Menu refresh skipped, no active generation");
            return Ok(false);
        };

        let request = RequestDescriptor::get(MENU_ENDPOINT);
        let key = request.cache_key(&self.origin)?;
        match self.fetch(&request).await {
            Ok(response) if response.is_ok() => {
                self.store.put(dynamic, &key, &response)?;
                info!(%key, generation = %dynamic, "Menu cache updated");
                Ok(true)
            }
            Ok(response) => {
                warn!(%key, status = response.status, "Menu refresh rejected");
                Ok(false)
            }
            Err(e) => {
                warn!(%key, error = %e, "Menu refresh failed");
                Ok(false)
            }
        }
    }

    // == Stats ==
    pub fn stats(&self) -> InterceptStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    // == Helpers ==
    async fn fetch(&self, request: &RequestDescriptor) -> std::result::Result<ResponsePayload, FetchError> {
        let fetch = request.to_fetch(&self.origin)?;
        fetch_within(self.network.as_ref(), fetch, self.timeout).await
    }

    /// Reads `key` from one generation. Storage errors read as a miss.
    fn lookup(&self, generation: Option<&str>, key: &str) -> Option<ResponsePayload> {
        let generation = generation?;
        let found = match self.store.match_entry(generation, key) {
            Ok(entry) => entry.map(|e| e.payload),
            Err(e) => {
                warn!(%key, %generation, error = %e, "Cache read failed");
                None
            }
        };
        self.record(|stats| stats.record_lookup(found.is_some()));
        found
    }

    /// Writes a response; a failed write never fails the request.
    fn remember(&self, generation: Option<&str>, key: &str, response: &ResponsePayload) {
        let Some(generation) = generation else {
            return;
        };
        if let Err(e) = self.store.put(generation, key, response) {
            warn!(%key, %generation, error = %e, "Cache write failed");
        }
    }

    fn record(&self, f: impl FnOnce(&mut InterceptStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}
