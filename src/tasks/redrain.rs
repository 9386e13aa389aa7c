//! Re-drain Task
//!
//! Follow-up drain cycles for operations that failed and are still retryable.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::queue::{DrainReport, OfflineQueue};

/// Schedules follow-up drains with the queue's backoff.
///
/// At most one follow-up loop runs at a time. The loop sleeps
/// `backoff.delay(n)` before its n-th drain, where n counts consecutive
/// cycles that left retryable entries, and exits once a cycle settles.
#[derive(Clone)]
pub struct RedrainScheduler {
    queue: Arc<OfflineQueue>,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RedrainScheduler {
    pub fn new(queue: Arc<OfflineQueue>) -> Self {
        Self {
            queue,
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts a follow-up loop if `report` left anything to retry.
    pub fn after_drain(&self, report: &DrainReport) {
        if report.is_settled() {
            return;
        }
        self.schedule();
    }

    /// True while a follow-up loop is waiting or draining.
    pub fn is_scheduled(&self) -> bool {
        self.handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Stops the follow-up loop, if any.
    pub fn abort(&self) {
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(h) = handle.take() {
                h.abort();
            }
        }
    }

    fn schedule(&self) {
        let Ok(mut handle) = self.handle.lock() else {
            return;
        };
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Re-drain already scheduled");
            return;
        }

        let queue = self.queue.clone();
        *handle = Some(tokio::spawn(async move {
            let backoff = queue.policy().backoff;
            let mut cycle = 1;
            loop {
                let delay = backoff.delay(cycle);
                debug!(cycle, delay_ms = delay.as_millis() as u64, "Re-drain scheduled");
                tokio::time::sleep(delay).await;

                match queue.drain().await {
                    Ok(report) if report.is_settled() => {
                        info!(
                            delivered = report.delivered.len(),
                            dead = report.dead.len(),
                            "Re-drain settled"
                        );
                        break;
                    }
                    Ok(report) => {
                        warn!(cycle, retrying = report.retrying.len(), "Re-drain left entries pending");
                    }
                    Err(e) => {
                        warn!(cycle, error = %e, "Re-drain failed");
                    }
                }
                cycle += 1;
            }
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use url::Url;

    use crate::db::Database;
    use crate::network::ScriptedNetwork;
    use crate::queue::{Backoff, OperationPayload, OperationStatus, RetryPolicy};

    fn setup(max_attempts: u32) -> (RedrainScheduler, Arc<OfflineQueue>, Arc<ScriptedNetwork>) {
        let origin = Url::parse("http://localhost:8080").unwrap();
        let net = Arc::new(ScriptedNetwork::new(origin.clone()));
        let queue = Arc::new(OfflineQueue::new(
            Arc::new(Database::in_memory().unwrap()),
            net.clone(),
            RetryPolicy {
                max_attempts,
                backoff: Backoff::Fixed(Duration::from_millis(20)),
            },
            origin,
            Duration::from_millis(200),
        ));
        (RedrainScheduler::new(queue.clone()), queue, net)
    }

    #[tokio::test]
    async fn test_settled_report_schedules_nothing() {
        let (scheduler, _queue, _net) = setup(5);
        scheduler.after_drain(&DrainReport::default());
        assert!(!scheduler.is_scheduled());
    }

    #[tokio::test]
    async fn test_redrain_delivers_once_back_online() {
        let (scheduler, queue, net) = setup(5);
        net.set_online(false);
        queue
            .enqueue(OperationPayload::post_json("/api/orders", "{}"))
            .unwrap();

        let report = queue.drain().await.unwrap();
        assert_eq!(report.retrying.len(), 1);

        net.route(
            "POST",
            "/api/orders",
            crate::network::Scripted::Respond(crate::cache::ResponsePayload::new(201, "{}")),
        );
        net.set_online(true);
        scheduler.after_drain(&report);
        assert!(scheduler.is_scheduled());

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(queue.list().unwrap().is_empty());
        assert!(!scheduler.is_scheduled());
    }

    #[tokio::test]
    async fn test_redrain_stops_when_entries_go_dead() {
        let (scheduler, queue, net) = setup(3);
        net.set_online(false);
        let id = queue
            .enqueue(OperationPayload::post_json("/api/orders", "{}"))
            .unwrap();

        let report = queue.drain().await.unwrap();
        scheduler.after_drain(&report);
        tokio::time::sleep(Duration::from_millis(400)).await;

        let op = queue.get(id).unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Dead);
        assert_eq!(op.attempts, 3);
        assert!(!scheduler.is_scheduled());
    }

    #[tokio::test]
    async fn test_abort_stops_loop() {
        let (scheduler, queue, net) = setup(5);
        net.set_online(false);
        queue
            .enqueue(OperationPayload::post_json("/api/orders", "{}"))
            .unwrap();
        let report = queue.drain().await.unwrap();

        scheduler.after_drain(&report);
        scheduler.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!scheduler.is_scheduled());
        assert_eq!(queue.pending().unwrap()[0].attempts, 1);
    }
}
