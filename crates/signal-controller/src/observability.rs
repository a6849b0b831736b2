//! Health endpoints and coordinator metrics.
//!
//! - `GET /health` - liveness probe (process is running)
//! - `GET /ready` - readiness probe (signaling listener is bound and the
//!   process is not shutting down)
//!
//! The `/metrics` endpoint is attached in `main` from the Prometheus
//! exporter handle and renders everything recorded through the `metrics`
//! macros alongside the [`CoordinatorMetrics`] gauges below.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use metrics::{counter, gauge};

/// Liveness/readiness state for the probe endpoints.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live, not yet ready).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the service ready to accept connections.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the service not ready (shutdown in progress).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Check liveness.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Check readiness.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Build the probe router.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn liveness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Live counters for the coordinator, shared between the actor system
/// (writers) and the status/metrics surface (readers). Lock-free; also
/// mirrored into the Prometheus exporter.
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    active_rooms: AtomicUsize,
    active_connections: AtomicUsize,
    events_processed: AtomicU64,
}

/// Snapshot of coordinator metrics at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorMetricsSnapshot {
    /// Rooms currently held in the room store.
    pub rooms: usize,
    /// Live client connections.
    pub connections: usize,
    /// Total inbound events routed since startup.
    pub events_processed: u64,
}

impl CoordinatorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a room created.
    pub fn room_created(&self) {
        let rooms = self.active_rooms.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("sc_rooms_created_total").increment(1);
        set_gauge("sc_active_rooms", rooms);
    }

    /// Record a room removed (actor terminated).
    pub fn room_removed(&self) {
        let rooms = self
            .active_rooms
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        set_gauge("sc_active_rooms", rooms);
    }

    /// Record a connection opened.
    pub fn connection_opened(&self) {
        let connections = self.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        set_gauge("sc_active_connections", connections);
    }

    /// Record a connection torn down.
    pub fn connection_closed(&self) {
        let connections = self
            .active_connections
            .fetch_sub(1, Ordering::Relaxed)
            .saturating_sub(1);
        set_gauge("sc_active_connections", connections);
    }

    /// Record one routed inbound event.
    pub fn record_event(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        counter!("sc_events_total").increment(1);
    }

    /// Current room count.
    #[must_use]
    pub fn rooms(&self) -> usize {
        self.active_rooms.load(Ordering::Relaxed)
    }

    /// Current connection count.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Take a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorMetricsSnapshot {
        CoordinatorMetricsSnapshot {
            rooms: self.active_rooms.load(Ordering::Relaxed),
            connections: self.active_connections.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
        }
    }
}

#[allow(clippy::cast_precision_loss)] // counts stay far below 2^52
fn set_gauge(name: &'static str, value: usize) {
    gauge!(name).set(value as f64);
}
