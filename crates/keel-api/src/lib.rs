//! keel-api - REST API for Keel desired state.
//!
//! Provides axum route handlers that accept, validate, merge, and serve
//! desired LRPs and tasks. Handlers talk to the store only through
//! [`SpecGateway`], and every gateway call is bounded by the configured
//! store timeout.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/desired_lrps` | Desire an LRP (idempotent) |
//! | GET | `/desired_lrps` | List all desired LRPs |
//! | GET | `/desired_lrps/{process_guid}` | Get a desired LRP |
//! | PUT | `/desired_lrps/{process_guid}` | Partially update a desired LRP |
//! | DELETE | `/desired_lrps/{process_guid}` | Remove a desired LRP |
//! | GET | `/domains/{domain}/desired_lrps` | List desired LRPs in a domain |
//! | POST | `/tasks` | Desire a task |
//! | GET | `/tasks` | List all tasks |
//! | GET | `/tasks/{task_guid}` | Get a task |
//! | GET | `/domains/{domain}/tasks` | List tasks in a domain |
//! | GET | `/ping` | Liveness |

pub mod error;
pub mod handlers;
pub mod mapper;
pub mod merge;
pub mod task_handlers;
pub mod validate;
pub mod wire;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::error;

use keel_state::{GatewayFuture, SpecGateway, StateResult};

pub use error::{ApiError, ErrorBody, ErrorKind};

/// Upper bound on a single store call unless configured otherwise.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<dyn SpecGateway>,
    pub store_timeout: Duration,
}

impl ApiState {
    pub fn new(gateway: Arc<dyn SpecGateway>) -> Self {
        Self {
            gateway,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Await a gateway call under the store deadline.
    ///
    /// The outer error is the deadline expiring; the inner result is the
    /// store's own outcome, left for the handler to classify.
    pub(crate) async fn call<T>(
        &self,
        operation: &'static str,
        future: GatewayFuture<'_, T>,
    ) -> Result<StateResult<T>, ApiError> {
        tokio::time::timeout(self.store_timeout, future)
            .await
            .map_err(|_| {
                error!(
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "store call timed out"
                );
                ApiError::unknown("store request timed out")
            })
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route(
            "/desired_lrps",
            get(handlers::list_desired_lrps).post(handlers::create_desired_lrp),
        )
        .route(
            "/desired_lrps/{process_guid}",
            get(handlers::get_desired_lrp)
                .put(handlers::update_desired_lrp)
                .delete(handlers::delete_desired_lrp),
        )
        .route(
            "/domains/{domain}/desired_lrps",
            get(handlers::list_desired_lrps_by_domain),
        )
        .route(
            "/tasks",
            get(task_handlers::list_tasks).post(task_handlers::create_task),
        )
        .route("/tasks/{task_guid}", get(task_handlers::get_task))
        .route("/domains/{domain}/tasks", get(task_handlers::list_tasks_by_domain))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
