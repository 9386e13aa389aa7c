//! API Module
//!
//! HTTP surface of the orchestrator, one route per worker event.
//!
//! # Endpoints
//! - `POST /fetch` - Intercept one outbound request
//! - `POST /lifecycle/install` - Install the static generation
//! - `POST /lifecycle/activate` - Promote the installed generation
//! - `GET /lifecycle` - Lifecycle state and current generations
//! - `POST /message` - Client control message (`SKIP_WAITING`)
//! - `POST /sync/:tag` - Sync trigger (`offline-order`, `menu-update`)
//! - `POST /push` - Push payload to alert descriptor
//! - `POST /notification/click` - Alert action selection
//! - `GET /generations` - Stored generations
//! - `GET /queue` - Offline queue contents
//! - `GET /stats` - Interception statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
