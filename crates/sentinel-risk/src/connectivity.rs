//! Connectivity health monitoring.
//!
//! Classifies the market-data stream as healthy or degraded from the
//! heartbeat age and dropped-event count carried in each tick snapshot.
//! The monitor itself is stateless; the orchestrator owns the
//! degraded-since timestamp and the post-recovery cooldown.

use crate::config::ConnectivityConfig;
use chrono::{DateTime, Duration, Utc};
use sentinel_core::HealthView;
use tracing::warn;

/// Result of one health classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthVerdict {
    pub is_degraded: bool,
    /// Names what degraded the stream; empty when healthy.
    pub reason: String,
}

impl HealthVerdict {
    pub fn healthy() -> Self {
        Self {
            is_degraded: false,
            reason: String::new(),
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            is_degraded: true,
            reason: reason.into(),
        }
    }
}

/// Stateless stream-health classifier.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    config: ConnectivityConfig,
}

impl ConnectivityMonitor {
    pub fn new(config: ConnectivityConfig) -> Self {
        Self { config }
    }

    /// Degraded when the heartbeat is stale OR too many events dropped.
    pub fn check_health(&self, health: &HealthView) -> HealthVerdict {
        if health.heartbeat_age_ms > self.config.heartbeat_stale_ms {
            warn!(
                heartbeat_age_ms = health.heartbeat_age_ms,
                "stream degraded: stale heartbeat"
            );
            return HealthVerdict::degraded(format!(
                "heartbeat {}ms stale > {}ms max",
                health.heartbeat_age_ms, self.config.heartbeat_stale_ms
            ));
        }
        if health.dropped_events >= self.config.max_dropped_events {
            warn!(
                dropped = health.dropped_events,
                "stream degraded: dropped events"
            );
            return HealthVerdict::degraded(format!(
                "{} dropped events >= {} max",
                health.dropped_events, self.config.max_dropped_events
            ));
        }
        HealthVerdict::healthy()
    }

    /// Recovery needs both conditions back inside limits: heartbeat fresh
    /// AND zero dropped events since the counter reset.
    pub fn check_recovery(&self, health: &HealthView) -> bool {
        health.heartbeat_age_ms <= self.config.heartbeat_stale_ms && health.dropped_events == 0
    }

    /// Whether a continuous degraded spell has hit the HALT timeout.
    pub fn degraded_timeout(&self, entered_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - entered_at >= Duration::seconds(self.config.degraded_timeout_secs)
    }

    /// Whether the post-recovery re-entry cooldown is still running.
    pub fn in_reentry_cooldown(&self, recovered_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - recovered_at < Duration::seconds(self.config.reentry_cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> ConnectivityMonitor {
        ConnectivityMonitor::new(ConnectivityConfig::default())
    }

    fn health(heartbeat_age_ms: i64, dropped_events: u32) -> HealthView {
        HealthView {
            rest_latency_p95_ms: 200,
            heartbeat_age_ms,
            dropped_events,
        }
    }

    #[test]
    fn test_healthy_stream() {
        let verdict = monitor().check_health(&health(2_000, 0));
        assert!(!verdict.is_degraded);
    }

    #[test]
    fn test_stale_heartbeat_degrades() {
        let verdict = monitor().check_health(&health(10_001, 0));
        assert!(verdict.is_degraded);
        assert!(verdict.reason.contains("heartbeat"));
    }

    #[test]
    fn test_heartbeat_exactly_at_limit_is_healthy() {
        let verdict = monitor().check_health(&health(10_000, 0));
        assert!(!verdict.is_degraded);
    }

    #[test]
    fn test_dropped_events_degrade() {
        let verdict = monitor().check_health(&health(1_000, 3));
        assert!(verdict.is_degraded);
        assert!(verdict.reason.contains("dropped"));
    }

    #[test]
    fn test_recovery_needs_both_conditions() {
        let m = monitor();
        assert!(m.check_recovery(&health(5_000, 0)));
        assert!(!m.check_recovery(&health(5_000, 1)));
        assert!(!m.check_recovery(&health(11_000, 0)));
    }

    #[test]
    fn test_degraded_timeout_at_sixty_seconds() {
        let m = monitor();
        let now = Utc::now();
        assert!(!m.degraded_timeout(now - Duration::seconds(59), now));
        assert!(m.degraded_timeout(now - Duration::seconds(60), now));
    }

    #[test]
    fn test_reentry_cooldown_window() {
        let m = monitor();
        let now = Utc::now();
        assert!(m.in_reentry_cooldown(now - Duration::seconds(299), now));
        assert!(!m.in_reentry_cooldown(now - Duration::seconds(300), now));
    }
}
