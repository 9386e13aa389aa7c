//! Service Worker
//!
//! Dispatch table tying every inbound event to the component that handles
//! it: lifecycle signals, request interception, sync triggers, messages and
//! notifications.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::lifecycle::{ActivationReport, LifecycleController, LifecycleStatus};
use crate::network::{Network, RequestDescriptor};
use crate::notify::{AlertDescriptor, NavigationTarget, NotificationDispatcher};
use crate::queue::{DrainReport, OfflineQueue, OFFLINE_ORDER_TAG};
use crate::strategy::{Handled, RequestClassifier, StrategyEngine};
use crate::tasks::RedrainScheduler;

/// Sync tag that refreshes the cached menu.
pub const MENU_UPDATE_TAG: &str = "menu-update";

// == Events ==
/// Control message posted by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Promote a waiting generation now
    SkipWaiting,
}

#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(RequestDescriptor),
    /// One-off sync trigger
    Sync(String),
    /// Recurring sync trigger
    PeriodicSync(String),
    Message(WorkerMessage),
    Push(Option<String>),
    NotificationClick(String),
}

#[derive(Debug, Clone)]
pub enum EventOutcome {
    Lifecycle(LifecycleStatus),
    Activated(ActivationReport),
    Response(Handled),
    Drained(DrainReport),
    /// Whether a fresh menu was stored
    MenuRefreshed(bool),
    Alert(AlertDescriptor),
    Navigate(Option<NavigationTarget>),
}

// == Service Worker ==
pub struct ServiceWorker {
    store: CacheStore,
    lifecycle: Arc<LifecycleController>,
    engine: Arc<StrategyEngine>,
    queue: Arc<OfflineQueue>,
    notifier: NotificationDispatcher,
    redrain: RedrainScheduler,
}

impl ServiceWorker {
    /// Wires every component over one database and one network.
    ///
    /// Restores the persisted generation pointers and puts operations left
    /// IN_FLIGHT by an interrupted drain back to PENDING.
    pub fn bootstrap(config: &Config, db: Arc<Database>, network: Arc<dyn Network>) -> Result<Self> {
        let store = CacheStore::new(db.clone());
        let manifest = config.manifest();
        let timeout = config.network_timeout();

        let lifecycle = Arc::new(LifecycleController::load(
            store.clone(),
            network.clone(),
            manifest.clone(),
            config.generation_names(),
            config.origin.clone(),
            timeout,
        )?);
        lifecycle.set_skip_waiting(config.skip_waiting)?;

        let queue = Arc::new(OfflineQueue::new(
            db,
            network.clone(),
            config.retry_policy(),
            config.origin.clone(),
            timeout,
        ));
        let recovered = queue.recover_in_flight()?;
        if recovered > 0 {
            warn!(recovered, "Recovered interrupted deliveries");
        }

        let engine = Arc::new(StrategyEngine::new(
            store.clone(),
            network,
            lifecycle.clone(),
            queue.clone(),
            RequestClassifier::new(config.origin.clone(), &manifest),
            config.origin.clone(),
            timeout,
        ));

        Ok(Self {
            store,
            lifecycle,
            engine,
            redrain: RedrainScheduler::new(queue.clone()),
            queue,
            notifier: NotificationDispatcher::new(&config.app_name),
        })
    }

    // == Dispatch ==
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome> {
        match event {
            Event::Install => Ok(EventOutcome::Lifecycle(self.lifecycle.install().await?)),
            Event::Activate => Ok(EventOutcome::Activated(self.lifecycle.activate().await?)),
            Event::Fetch(request) => Ok(EventOutcome::Response(self.engine.handle(&request).await?)),
            Event::Sync(tag) | Event::PeriodicSync(tag) => self.sync(&tag).await,
            Event::Message(WorkerMessage::SkipWaiting) => {
                info!("Skip-waiting requested");
                Ok(EventOutcome::Lifecycle(self.lifecycle.skip_waiting().await?))
            }
            Event::Push(payload) => Ok(EventOutcome::Alert(self.notifier.on_push(payload.as_deref()))),
            Event::NotificationClick(action) => {
                Ok(EventOutcome::Navigate(self.notifier.on_action(&action)))
            }
        }
    }

    async fn sync(&self, tag: &str) -> Result<EventOutcome> {
        match tag {
            OFFLINE_ORDER_TAG => {
                let report = self.queue.drain().await?;
                self.redrain.after_drain(&report);
                Ok(EventOutcome::Drained(report))
            }
            MENU_UPDATE_TAG => Ok(EventOutcome::MenuRefreshed(self.engine.refresh_menu().await?)),
            other => Err(Error::InvalidRequest(format!("unknown sync tag: {}", other))),
        }
    }

    // == Accessors ==
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Stops any scheduled follow-up drain.
    pub fn shutdown(&self) {
        self.redrain.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::cache::ResponsePayload;
    use crate::lifecycle::LifecycleState;
    use crate::network::{Scripted, ScriptedNetwork};
    use crate::queue::OperationStatus;
    use crate::strategy::ServedFrom;

    fn config() -> Config {
        Config {
            network_timeout_ms: 200,
            retry_base_delay_ms: 20,
            retry_max_delay_ms: 50,
            skip_waiting: false,
            ..Config::default()
        }
    }

    fn worker(config: &Config) -> (ServiceWorker, Arc<ScriptedNetwork>) {
        let net = Arc::new(ScriptedNetwork::new(config.origin.clone()));
        for url in config.manifest().urls() {
            net.serve(url, url);
        }
        let db = Arc::new(Database::in_memory().unwrap());
        let worker = ServiceWorker::bootstrap(config, db, net.clone()).unwrap();
        (worker, net)
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let (worker, _net) = worker(&config());

        let outcome = worker.dispatch(Event::Install).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Lifecycle(ref s) if s.state == LifecycleState::Installed));

        let outcome = worker.dispatch(Event::Activate).await.unwrap();
        let EventOutcome::Activated(report) = outcome else {
            panic!("expected activation report");
        };
        assert_eq!(report.current_static, "bella-vista-static-v1.0.0");

        let mut generations = worker.store().list_generations().unwrap();
        generations.sort();
        assert_eq!(
            generations,
            vec!["bella-vista-dynamic-v1.0.0", "bella-vista-static-v1.0.0"]
        );
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates() {
        let (worker, _net) = worker(&config());
        worker.dispatch(Event::Install).await.unwrap();

        let outcome = worker
            .dispatch(Event::Message(WorkerMessage::SkipWaiting))
            .await
            .unwrap();

        assert!(matches!(outcome, EventOutcome::Lifecycle(ref s) if s.state == LifecycleState::Active));
    }

    #[tokio::test]
    async fn test_offline_order_roundtrip() {
        let (worker, net) = worker(&config());
        worker.dispatch(Event::Install).await.unwrap();
        worker.dispatch(Event::Activate).await.unwrap();
        net.set_online(false);

        let outcome = worker
            .dispatch(Event::Fetch(RequestDescriptor::post_json("/api/orders", "{}")))
            .await
            .unwrap();
        let EventOutcome::Response(handled) = outcome else {
            panic!("expected response");
        };
        assert_eq!(handled.source, ServedFrom::Queued);
        let queued = worker.queue().pending().unwrap();
        assert_eq!(queued[0].status, OperationStatus::Pending);
        assert_eq!(queued[0].attempts, 0);

        net.set_online(true);
        net.route("POST", "/api/orders", Scripted::Respond(ResponsePayload::new(201, "{}")));
        let outcome = worker
            .dispatch(Event::Sync(OFFLINE_ORDER_TAG.to_string()))
            .await
            .unwrap();
        let EventOutcome::Drained(report) = outcome else {
            panic!("expected drain report");
        };
        assert_eq!(report.delivered, vec![queued[0].id]);
        assert!(worker.queue().list().unwrap().is_empty());

        let again = worker
            .dispatch(Event::Sync(OFFLINE_ORDER_TAG.to_string()))
            .await
            .unwrap();
        assert!(matches!(again, EventOutcome::Drained(ref r) if r.attempted == 0));
        assert_eq!(net.call_count("POST", "/api/orders"), 2);
    }

    #[tokio::test]
    async fn test_failed_drain_schedules_redrain() {
        let (worker, net) = worker(&config());
        net.set_online(false);
        worker
            .queue()
            .enqueue(crate::queue::OperationPayload::post_json("/api/orders", "{}"))
            .unwrap();

        worker
            .dispatch(Event::Sync(OFFLINE_ORDER_TAG.to_string()))
            .await
            .unwrap();
        net.route("POST", "/api/orders", Scripted::Respond(ResponsePayload::new(200, "{}")));
        net.set_online(true);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(worker.queue().list().unwrap().is_empty());
        worker.shutdown();
    }

    #[tokio::test]
    async fn test_menu_update_sync() {
        let (worker, net) = worker(&config());
        worker.dispatch(Event::Install).await.unwrap();
        worker.dispatch(Event::Activate).await.unwrap();
        net.serve("/api/menu", "[]");

        let outcome = worker
            .dispatch(Event::PeriodicSync(MENU_UPDATE_TAG.to_string()))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::MenuRefreshed(true)));
    }

    #[tokio::test]
    async fn test_unknown_sync_tag_is_rejected() {
        let (worker, _net) = worker(&config());
        let result = worker.dispatch(Event::Sync("bogus".to_string())).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_push_and_click() {
        let (worker, _net) = worker(&config());

        let outcome = worker.dispatch(Event::Push(None)).await.unwrap();
        let EventOutcome::Alert(alert) = outcome else {
            panic!("expected alert");
        };
        assert_eq!(alert.title, "Bella Vista Restaurant");

        let outcome = worker
            .dispatch(Event::NotificationClick("view".to_string()))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Navigate(Some(ref t)) if t.navigate == "/cart.html"));
    }

    #[test]
    fn test_skip_waiting_message_parses() {
        let msg: WorkerMessage = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(msg, WorkerMessage::SkipWaiting);
    }
}
