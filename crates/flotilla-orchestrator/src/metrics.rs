//! Observability metrics for restart supervision.
//!
//! Exposed through the `metrics` crate facade; install any compatible
//! recorder (e.g. a Prometheus exporter) to collect them.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `flotilla_restarts_total` | Counter | `mode` | Replacement tasks created |
//! | `flotilla_restart_denials_total` | Counter | `reason` | Restarts refused by policy or ledger |
//! | `flotilla_pending_restarts` | Gauge | - | Delay loops currently registered |
//! | `flotilla_delay_loops_total` | Counter | `outcome` | Delay loops finished, by outcome |

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: replacement tasks created.
    pub const RESTARTS_TOTAL: &str = "flotilla_restarts_total";
    /// Counter: restarts refused by policy or ledger.
    pub const RESTART_DENIALS_TOTAL: &str = "flotilla_restart_denials_total";
    /// Gauge: delay loops currently registered.
    pub const PENDING_RESTARTS: &str = "flotilla_pending_restarts";
    /// Counter: delay loops finished, by outcome.
    pub const DELAY_LOOPS_TOTAL: &str = "flotilla_delay_loops_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Service mode (replicated, global).
    pub const MODE: &str = "mode";
    /// Denial reason (condition, attempts).
    pub const REASON: &str = "reason";
    /// Delay loop outcome (committed, cancelled).
    pub const OUTCOME: &str = "outcome";
}

/// Facade over the supervisor's metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupervisorMetrics;

impl SupervisorMetrics {
    /// Creates the metrics facade.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a replacement task created for a service of `mode`.
    pub fn record_restart(&self, mode: &'static str) {
        counter!(names::RESTARTS_TOTAL, labels::MODE => mode).increment(1);
    }

    /// Records a restart refused for `reason`.
    pub fn record_denial(&self, reason: &'static str) {
        counter!(names::RESTART_DENIALS_TOTAL, labels::REASON => reason).increment(1);
    }

    /// Updates the pending-restart gauge.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_pending_restarts(&self, pending: usize) {
        gauge!(names::PENDING_RESTARTS).set(pending as f64);
    }

    /// Records a delay loop finishing with `outcome`.
    pub fn record_delay_loop(&self, outcome: &'static str) {
        counter!(names::DELAY_LOOPS_TOTAL, labels::OUTCOME => outcome).increment(1);
    }
}
