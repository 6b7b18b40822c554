//! Health of the pipeline's external dependencies: the two data sources and
//! the task store.
//!
//! Each component is updated by the code path that last touched it, so the
//! report reflects the most recent load or write rather than an active check.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// A source is failing; tasks that need it fail, the rest still run.
    Degraded,
    /// The store is failing; no task can make progress.
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

#[derive(Debug, Default)]
struct ComponentState {
    consecutive_failures: u32,
    last_error: Option<String>,
    changed_at: Option<DateTime<Utc>>,
}

/// One tracked dependency.
///
/// Starts healthy; a single failure marks it unhealthy and the next success
/// clears it.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    state: Mutex<ComponentState>,
}

impl ComponentHealth {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(ComponentState {
                consecutive_failures: 0,
                last_error: None,
                changed_at: None,
            }),
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.consecutive_failures > 0 {
            state.changed_at = Some(Utc::now());
        }
        state.consecutive_failures = 0;
        state.last_error = None;
    }

    pub fn record_failure(&self, error: impl Into<String>) {
        let mut state = self.state.lock();
        if state.consecutive_failures == 0 {
            state.changed_at = Some(Utc::now());
        }
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_error = Some(error.into());
    }

    pub fn is_healthy(&self) -> bool {
        self.state.lock().consecutive_failures == 0
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn snapshot(&self) -> ComponentSnapshot {
        let state = self.state.lock();
        ComponentSnapshot {
            name: self.name.to_string(),
            healthy: state.consecutive_failures == 0,
            consecutive_failures: state.consecutive_failures,
            last_error: state.last_error.clone(),
            changed_at: state.changed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub name: String,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// When the component last flipped between healthy and failing
    pub changed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentSnapshot>,
    pub checked_at: DateTime<Utc>,
}

pub struct HealthRegistry {
    pub source_a: ComponentHealth,
    pub source_b: ComponentHealth,
    pub store: ComponentHealth,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            source_a: ComponentHealth::new("source_a"),
            source_b: ComponentHealth::new("source_b"),
            store: ComponentHealth::new("store"),
        }
    }

    pub fn report(&self) -> HealthReport {
        let status = if !self.store.is_healthy() {
            HealthStatus::Unhealthy
        } else if !self.source_a.is_healthy() || !self.source_b.is_healthy() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            components: vec![
                self.source_a.snapshot(),
                self.source_b.snapshot(),
                self.store.snapshot(),
            ],
            checked_at: Utc::now(),
        }
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static HEALTH: std::sync::LazyLock<HealthRegistry> = std::sync::LazyLock::new(HealthRegistry::new);

/// Global health registry.
pub fn health() -> &'static HealthRegistry {
    &HEALTH
}
