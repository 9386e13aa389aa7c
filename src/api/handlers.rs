//! API Handlers
//!
//! HTTP request handlers, one per event in the worker's dispatch table.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::lifecycle::{ActivationReport, LifecycleStatus};
use crate::models::{
    validate_fetch, ClickRequest, GenerationsResponse, HealthResponse, QueueResponse,
    StatsResponse,
};
use crate::network::{Network, RequestDescriptor};
use crate::notify::AlertDescriptor;
use crate::strategy::Handled;
use crate::worker::{Event, EventOutcome, ServiceWorker, WorkerMessage};

/// Header naming where an intercepted response came from.
pub const SERVED_FROM_HEADER: &str = "x-served-from";

/// Headers that describe the original transfer and must not be replayed.
const HOP_BY_HOP: &[&str] = &["connection", "content-length", "transfer-encoding", "keep-alive"];

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<ServiceWorker>,
}

impl AppState {
    /// Creates a new AppState around a running worker.
    pub fn new(worker: ServiceWorker) -> Self {
        Self {
            worker: Arc::new(worker),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Bootstraps the worker over the given database and network.
    pub fn from_config(
        config: &Config,
        db: Arc<Database>,
        network: Arc<dyn Network>,
    ) -> Result<Self> {
        Ok(Self::new(ServiceWorker::bootstrap(config, db, network)?))
    }
}

fn unexpected(outcome: EventOutcome) -> Error {
    Error::Internal(format!("Unexpected event outcome: {:?}", outcome))
}

// == Interception ==
/// Handler for POST /fetch
///
/// Replays the resolved response verbatim and tags it with its source.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Json(req): Json<RequestDescriptor>,
) -> Result<Response> {
    if let Some(error_msg) = validate_fetch(&req) {
        return Err(Error::InvalidRequest(error_msg));
    }

    match state.worker.dispatch(Event::Fetch(req)).await? {
        EventOutcome::Response(handled) => Ok(replay(handled)),
        other => Err(unexpected(other)),
    }
}

fn replay(handled: Handled) -> Response {
    let payload = handled.response;
    let mut response = Response::new(Body::from(payload.body));
    *response.status_mut() = StatusCode::from_u16(payload.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for (name, value) in &payload.headers {
        if HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            continue;
        }
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!(header = %name, "Dropping unrepresentable header"),
        }
    }
    headers.insert(
        SERVED_FROM_HEADER,
        HeaderValue::from_static(handled.source.as_str()),
    );
    response
}

// == Lifecycle ==
/// Handler for POST /lifecycle/install
pub async fn install_handler(State(state): State<AppState>) -> Result<Json<LifecycleStatus>> {
    match state.worker.dispatch(Event::Install).await? {
        EventOutcome::Lifecycle(status) => Ok(Json(status)),
        other => Err(unexpected(other)),
    }
}

/// Handler for POST /lifecycle/activate
pub async fn activate_handler(State(state): State<AppState>) -> Result<Json<ActivationReport>> {
    match state.worker.dispatch(Event::Activate).await? {
        EventOutcome::Activated(report) => Ok(Json(report)),
        other => Err(unexpected(other)),
    }
}

/// Handler for GET /lifecycle
pub async fn lifecycle_handler(State(state): State<AppState>) -> Result<Json<LifecycleStatus>> {
    Ok(Json(state.worker.lifecycle().status().await?))
}

/// Handler for POST /message
pub async fn message_handler(
    State(state): State<AppState>,
    Json(message): Json<WorkerMessage>,
) -> Result<Json<LifecycleStatus>> {
    match state.worker.dispatch(Event::Message(message)).await? {
        EventOutcome::Lifecycle(status) => Ok(Json(status)),
        other => Err(unexpected(other)),
    }
}

// == Sync ==
/// Handler for POST /sync/:tag
pub async fn sync_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Response> {
    match state.worker.dispatch(Event::Sync(tag)).await? {
        EventOutcome::Drained(report) => Ok(Json(report).into_response()),
        EventOutcome::MenuRefreshed(refreshed) => {
            Ok(Json(json!({ "refreshed": refreshed })).into_response())
        }
        other => Err(unexpected(other)),
    }
}

// == Notifications ==
/// Handler for POST /push
///
/// The body is the opaque push payload; an empty body gets the default text.
pub async fn push_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<AlertDescriptor>> {
    let payload = Some(body).filter(|b| !b.is_empty());
    match state.worker.dispatch(Event::Push(payload)).await? {
        EventOutcome::Alert(alert) => Ok(Json(alert)),
        other => Err(unexpected(other)),
    }
}

/// Handler for POST /notification/click
pub async fn click_handler(
    State(state): State<AppState>,
    Json(req): Json<ClickRequest>,
) -> Result<Json<serde_json::Value>> {
    if let Some(error_msg) = req.validate() {
        return Err(Error::InvalidRequest(error_msg));
    }

    match state.worker.dispatch(Event::NotificationClick(req.action)).await? {
        EventOutcome::Navigate(target) => {
            Ok(Json(json!({ "navigate": target.map(|t| t.navigate) })))
        }
        other => Err(unexpected(other)),
    }
}

// == Inspection ==
/// Handler for GET /generations
pub async fn generations_handler(
    State(state): State<AppState>,
) -> Result<Json<GenerationsResponse>> {
    let view = state.worker.lifecycle().view().await;
    Ok(Json(GenerationsResponse {
        current_static: view.current_static().map(str::to_string),
        current_dynamic: view.current_dynamic().map(str::to_string),
        generations: state.worker.store().list_generations()?,
    }))
}

/// Handler for GET /queue
pub async fn queue_handler(State(state): State<AppState>) -> Result<Json<QueueResponse>> {
    let queue = state.worker.queue();
    Ok(Json(QueueResponse::new(queue.counts()?, queue.list()?)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.worker.engine().stats();
    let counts = state.worker.queue().counts()?;
    Ok(Json(StatsResponse::new(&stats, counts)))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
