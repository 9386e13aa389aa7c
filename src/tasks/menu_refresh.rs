//! Menu Refresh Task
//!
//! Background task that periodically fires the menu-update sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::worker::{Event, EventOutcome, ServiceWorker, MENU_UPDATE_TAG};

/// Spawns a background task that refreshes the cached menu.
///
/// The task sleeps for the interval, then dispatches a periodic
/// `menu-update` sync through the worker. Failures are logged and the loop
/// keeps going.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
pub fn spawn_menu_refresh_task(worker: Arc<ServiceWorker>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!("Starting menu refresh task with interval of {} seconds", interval_secs);

        loop {
            tokio::time::sleep(interval).await;

            match worker
                .dispatch(Event::PeriodicSync(MENU_UPDATE_TAG.to_string()))
                .await
            {
                Ok(EventOutcome::MenuRefreshed(true)) => info!("Menu refresh: cache updated"),
                Ok(_) => debug!("Menu refresh: nothing stored"),
                Err(e) => warn!(error = %e, "Menu refresh failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Config;
    use crate::db::Database;
    use crate::network::ScriptedNetwork;

    async fn active_worker() -> (Arc<ServiceWorker>, Arc<ScriptedNetwork>) {
        let config = Config {
            network_timeout_ms: 200,
            ..Config::default()
        };
        let net = Arc::new(ScriptedNetwork::new(config.origin.clone()));
        for url in config.manifest().urls() {
            net.serve(url, "asset");
        }
        let db = Arc::new(Database::in_memory().unwrap());
        let worker = ServiceWorker::bootstrap(&config, db, net.clone()).unwrap();
        worker.dispatch(Event::Install).await.unwrap();
        (Arc::new(worker), net)
    }

    #[tokio::test]
    async fn test_menu_refresh_task_stores_menu() {
        let (worker, net) = active_worker().await;
        net.serve("/api/menu", r#"[{"name":"Margherita"}]"#);

        let handle = spawn_menu_refresh_task(worker.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let dynamic = worker.lifecycle().current_dynamic().await.unwrap();
        let entry = worker.store().match_entry(&dynamic, "GET /api/menu").unwrap();
        assert!(entry.is_some(), "Menu should have been refreshed");

        handle.abort();
    }

    #[tokio::test]
    async fn test_menu_refresh_task_survives_offline() {
        let (worker, net) = active_worker().await;
        net.set_online(false);

        let handle = spawn_menu_refresh_task(worker, 1);
        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert!(!handle.is_finished(), "Task should keep running after a failure");
        handle.abort();
    }

    #[tokio::test]
    async fn test_menu_refresh_task_can_be_aborted() {
        let (worker, _net) = active_worker().await;

        let handle = spawn_menu_refresh_task(worker, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
