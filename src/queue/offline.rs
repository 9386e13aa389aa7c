//! Offline Write Queue
//!
//! Durable FIFO of mutating operations, drained when connectivity returns.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::cache::{parse_timestamp, timestamp};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::network::{fetch_within, resolve_url, FetchRequest, Network};
use crate::queue::{OperationPayload, OperationStatus, QueuedOperation, RetryPolicy};

const SELECT_COLUMNS: &str =
    "id, method, target, body, content_type, attempts, status, enqueued_at, last_error";

// == Drain Report ==
/// What one drain cycle did, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub delivered: Vec<Uuid>,
    /// Failed this cycle, back to PENDING
    pub retrying: Vec<Uuid>,
    /// Failed this cycle and dead-lettered
    pub dead: Vec<Uuid>,
    /// Storage failed while processing; left for a later cycle
    pub errors: Vec<Uuid>,
}

impl DrainReport {
    /// True when nothing is left to retry.
    pub fn is_settled(&self) -> bool {
        self.retrying.is_empty() && self.errors.is_empty()
    }
}

/// Row counts by status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub dead: usize,
}

// == Offline Queue ==
/// Exclusive owner of every queued operation.
pub struct OfflineQueue {
    db: Arc<Database>,
    network: Arc<dyn Network>,
    policy: RetryPolicy,
    origin: Url,
    timeout: Duration,
    drain_lock: tokio::sync::Mutex<()>,
}

impl OfflineQueue {
    // == Constructor ==
    pub fn new(
        db: Arc<Database>,
        network: Arc<dyn Network>,
        policy: RetryPolicy,
        origin: Url,
        timeout: Duration,
    ) -> Self {
        Self {
            db,
            network,
            policy,
            origin,
            timeout,
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    // == Enqueue ==
    /// Persists a new PENDING operation with zero attempts.
    pub fn enqueue(&self, payload: OperationPayload) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO queued_operations
                (id, method, target, body, content_type, attempts, status, enqueued_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
            params![
                id.to_string(),
                payload.method,
                payload.target,
                payload.body,
                payload.content_type,
                OperationStatus::Pending.as_str(),
                timestamp(Utc::now())
            ],
        )?;

        info!(%id, method = %payload.method, target = %payload.target, "Operation queued for later delivery");
        Ok(id)
    }

    // == Recover ==
    /// Resets operations left IN_FLIGHT by an interrupted drain to PENDING.
    ///
    /// Must run before the first drain after startup.
    pub fn recover_in_flight(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let recovered = conn.execute(
            "UPDATE queued_operations SET status = ? WHERE status = ?",
            params![
                OperationStatus::Pending.as_str(),
                OperationStatus::InFlight.as_str()
            ],
        )?;
        if recovered > 0 {
            warn!(recovered, "Recovered interrupted deliveries as pending");
        }
        Ok(recovered)
    }

    // == Inspection ==
    /// Every stored operation in enqueue order, DEAD ones included.
    pub fn list(&self) -> Result<Vec<QueuedOperation>> {
        self.select("", params![])
    }

    pub fn pending(&self) -> Result<Vec<QueuedOperation>> {
        self.select(
            "WHERE status = ?",
            params![OperationStatus::Pending.as_str()],
        )
    }

    pub fn get(&self, id: Uuid) -> Result<Option<QueuedOperation>> {
        let conn = self.db.lock()?;
        let sql = format!("SELECT {} FROM queued_operations WHERE id = ?", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![id.to_string()], OperationRow::from_row)
            .optional()?;
        row.map(OperationRow::into_operation).transpose()
    }

    pub fn counts(&self) -> Result<QueueCounts> {
        let conn = self.db.lock()?;
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM queued_operations GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts = QueueCounts::default();
        for (status, count) in rows {
            match status.parse::<OperationStatus>()? {
                OperationStatus::Pending => counts.pending = count as usize,
                OperationStatus::InFlight => counts.in_flight = count as usize,
                OperationStatus::Dead => counts.dead = count as usize,
                OperationStatus::Delivered => {}
            }
        }
        Ok(counts)
    }

    // == Drain ==
    /// Attempts delivery of every PENDING operation once, oldest first.
    ///
    /// A failed delivery never stops the cycle. Operations enqueued while a
    /// cycle runs wait for the next one. Concurrent drains are serialized.
    pub async fn drain(&self) -> Result<DrainReport> {
        let _cycle = self.drain_lock.lock().await;
        self.purge_delivered();
        let batch = self.pending()?;
        let mut report = DrainReport {
            attempted: batch.len(),
            ..DrainReport::default()
        };

        for operation in batch {
            let id = operation.id;
            if let Err(e) = self.set_status(id, OperationStatus::InFlight, operation.attempts, None) {
                warn!(%id, error = %e, "Could not claim queued operation, leaving it pending");
                report.errors.push(id);
                continue;
            }

            match self.deliver(&operation.payload).await {
                Ok(()) => {
                    info!(%id, status = %OperationStatus::Delivered, "Queued operation delivered");
                    report.delivered.push(id);
                    if let Err(e) = self.settle_delivered(id, operation.attempts) {
                        warn!(%id, error = %e, "Delivered operation could not be recorded");
                        report.errors.push(id);
                    }
                }
                Err(reason) => {
                    let attempts = operation.attempts + 1;
                    let status = if self.policy.is_exhausted(attempts) {
                        OperationStatus::Dead
                    } else {
                        OperationStatus::Pending
                    };
                    warn!(%id, attempts, %status, %reason, "Queued operation delivery failed");

                    if let Err(e) = self.set_status(id, status, attempts, Some(&reason)) {
                        warn!(%id, error = %e, "Could not record failed delivery");
                        report.errors.push(id);
                        continue;
                    }
                    match status {
                        OperationStatus::Dead => report.dead.push(id),
                        _ => report.retrying.push(id),
                    }
                }
            }
        }

        info!(
            attempted = report.attempted,
            delivered = report.delivered.len(),
            retrying = report.retrying.len(),
            dead = report.dead.len(),
            errors = report.errors.len(),
            "Drain cycle complete"
        );
        Ok(report)
    }

    /// Success means a 2xx response from the target.
    async fn deliver(&self, payload: &OperationPayload) -> std::result::Result<(), String> {
        let url = resolve_url(&payload.target, &self.origin).map_err(|e| e.to_string())?;
        let request = FetchRequest {
            method: payload.method.clone(),
            url,
            body: payload.body.as_ref().map(|b| b.clone().into_bytes()),
            content_type: payload.content_type.clone(),
        };

        let response = fetch_within(self.network.as_ref(), request, self.timeout)
            .await
            .map_err(|e| e.to_string())?;

        if response.is_ok() {
            Ok(())
        } else {
            Err(format!("status {}", response.status))
        }
    }

    // == Helpers ==
    fn select(
        &self,
        filter: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<QueuedOperation>> {
        let conn = self.db.lock()?;
        let sql = format!(
            "SELECT {} FROM queued_operations {} ORDER BY seq",
            SELECT_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, OperationRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(OperationRow::into_operation).collect()
    }

    fn set_status(
        &self,
        id: Uuid,
        status: OperationStatus,
        attempts: u32,
        last_error: Option<&str>,
    ) -> Result<()> {
        let conn = self.db.lock()?;
        let updated = conn.execute(
            "UPDATE queued_operations
             SET status = ?, attempts = ?, last_error = COALESCE(?, last_error)
             WHERE id = ?",
            params![status.as_str(), attempts, last_error, id.to_string()],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Queued operation {}", id)));
        }
        Ok(())
    }

    /// Records a confirmed delivery.
    ///
    /// The DELIVERED mark is written before the row is deleted, so a failed
    /// delete leaves a row that no drain or restart recovery picks up again.
    fn settle_delivered(&self, id: Uuid, attempts: u32) -> Result<()> {
        self.set_status(id, OperationStatus::Delivered, attempts, None)?;
        if let Err(e) = self.remove(id) {
            warn!(%id, error = %e, "Delivered operation kept until the next drain");
        }
        Ok(())
    }

    /// Best-effort removal of rows already marked DELIVERED.
    fn purge_delivered(&self) {
        let purged = self.db.lock().and_then(|conn| {
            conn.execute(
                "DELETE FROM queued_operations WHERE status = ?",
                params![OperationStatus::Delivered.as_str()],
            )
            .map_err(Error::from)
        });
        match purged {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged delivered operations"),
            Err(e) => warn!(error = %e, "Could not purge delivered operations"),
        }
    }

    fn remove(&self, id: Uuid) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "DELETE FROM queued_operations WHERE id = ?",
            params![id.to_string()],
        )?;
        Ok(())
    }
}

// == Row Mapping ==
struct OperationRow {
    id: String,
    method: String,
    target: String,
    body: Option<String>,
    content_type: Option<String>,
    attempts: u32,
    status: String,
    enqueued_at: String,
    last_error: Option<String>,
}

impl OperationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            method: row.get(1)?,
            target: row.get(2)?,
            body: row.get(3)?,
            content_type: row.get(4)?,
            attempts: row.get(5)?,
            status: row.get(6)?,
            enqueued_at: row.get(7)?,
            last_error: row.get(8)?,
        })
    }

    fn into_operation(self) -> Result<QueuedOperation> {
        Ok(QueuedOperation {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| Error::Internal(format!("Bad operation id {}: {}", self.id, e)))?,
            payload: OperationPayload {
                method: self.method,
                target: self.target,
                body: self.body,
                content_type: self.content_type,
            },
            attempts: self.attempts,
            status: self.status.parse()?,
            enqueued_at: parse_timestamp(&self.enqueued_at)?,
            last_error: self.last_error,
        })
    }
}
