use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters tracking event intake and action outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Events handed to the engine, from watchers or the API.
    pub events_received: AtomicU64,
    /// Rule matches, before cooldown and conditions.
    pub rules_matched: AtomicU64,
    /// Matches dropped because the rule was cooling down.
    pub cooldown_skipped: AtomicU64,
    /// Matches dropped because a condition did not pass.
    pub conditions_rejected: AtomicU64,
    /// Actions built and persisted.
    pub actions_created: AtomicU64,
    /// Actions parked for human approval.
    pub pending_approval: AtomicU64,
    /// Actions handed to the worker queue.
    pub queued: AtomicU64,
    /// Enqueue attempts refused because the queue was full.
    pub queue_full: AtomicU64,
    /// Actions approved by an operator.
    pub approved: AtomicU64,
    /// Actions rejected by an operator.
    pub rejected: AtomicU64,
    /// Runs that completed cleanly.
    pub completed: AtomicU64,
    /// Runs that completed with continued step errors.
    pub completed_with_errors: AtomicU64,
    /// Runs that failed, or actions that never reached a worker.
    pub failed: AtomicU64,
    /// Schedule-triggered rule firings.
    pub schedule_fired: AtomicU64,
}

impl EngineMetrics {
    pub fn increment_events_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rules_matched(&self) {
        self.rules_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cooldown_skipped(&self) {
        self.cooldown_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conditions_rejected(&self) {
        self.conditions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_actions_created(&self) {
        self.actions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_pending_approval(&self) {
        self.pending_approval.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_approved(&self) {
        self.approved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_completed_with_errors(&self) {
        self.completed_with_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_schedule_fired(&self) {
        self.schedule_fired.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            rules_matched: self.rules_matched.load(Ordering::Relaxed),
            cooldown_skipped: self.cooldown_skipped.load(Ordering::Relaxed),
            conditions_rejected: self.conditions_rejected.load(Ordering::Relaxed),
            actions_created: self.actions_created.load(Ordering::Relaxed),
            pending_approval: self.pending_approval.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            approved: self.approved.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            completed_with_errors: self.completed_with_errors.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            schedule_fired: self.schedule_fired.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`EngineMetrics`] at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub rules_matched: u64,
    pub cooldown_skipped: u64,
    pub conditions_rejected: u64,
    pub actions_created: u64,
    pub pending_approval: u64,
    pub queued: u64,
    pub queue_full: u64,
    pub approved: u64,
    pub rejected: u64,
    pub completed: u64,
    pub completed_with_errors: u64,
    pub failed: u64,
    pub schedule_fired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = EngineMetrics::default();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn increment_and_snapshot() {
        let m = EngineMetrics::default();
        m.increment_events_received();
        m.increment_events_received();
        m.increment_rules_matched();
        m.increment_queue_full();
        m.increment_completed_with_errors();

        let snap = m.snapshot();
        assert_eq!(snap.events_received, 2);
        assert_eq!(snap.rules_matched, 1);
        assert_eq!(snap.queue_full, 1);
        assert_eq!(snap.completed_with_errors, 1);
        assert_eq!(snap.completed, 0);
    }
}
