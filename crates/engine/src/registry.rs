use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use remedy_core::{RemediationEvent, RemediationRule, RuleId, TriggerType};

use crate::cooldown::cooldown_elapsed;
use crate::matcher::matches;

/// In-memory view of the enabled rules, shared by the event path, the
/// scheduler and the workers.
///
/// Matching works on clones taken under the read lock, so evaluation never
/// holds the lock across an await point. Cooldown claims take the write lock
/// so two events racing for the same rule cannot both pass.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: RwLock<HashMap<RuleId, RemediationRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with the enabled rules from `rules`.
    ///
    /// A `last_triggered` stamped in memory but not yet persisted is kept
    /// when it is newer than the incoming one, so a resync never reopens a
    /// cooldown window that was already claimed.
    pub fn replace_all(&self, rules: Vec<RemediationRule>) {
        let mut guard = self.rules.write();
        let mut next = HashMap::with_capacity(rules.len());
        for mut rule in rules.into_iter().filter(|r| r.enabled) {
            if let Some(existing) = guard.get(&rule.id) {
                rule.last_triggered = rule.last_triggered.max(existing.last_triggered);
                rule.execution_count = rule.execution_count.max(existing.execution_count);
            }
            next.insert(rule.id.clone(), rule);
        }
        *guard = next;
    }

    /// Insert or replace one rule. Disabled rules are removed instead.
    pub fn upsert(&self, rule: RemediationRule) {
        let mut guard = self.rules.write();
        if rule.enabled {
            guard.insert(rule.id.clone(), rule);
        } else {
            guard.remove(&rule.id);
        }
    }

    pub fn remove(&self, id: &RuleId) -> bool {
        self.rules.write().remove(id).is_some()
    }

    pub fn get(&self, id: &RuleId) -> Option<RemediationRule> {
        self.rules.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    /// All loaded rules, highest priority first, then by name.
    pub fn snapshot(&self) -> Vec<RemediationRule> {
        let mut rules: Vec<_> = self.rules.read().values().cloned().collect();
        sort_rules(&mut rules);
        rules
    }

    /// Rules whose trigger, filters and scope match `event`.
    pub fn matching(&self, event: &RemediationEvent) -> Vec<RemediationRule> {
        let mut rules: Vec<_> = self
            .rules
            .read()
            .values()
            .filter(|rule| matches(rule, event))
            .cloned()
            .collect();
        sort_rules(&mut rules);
        rules
    }

    /// Enabled schedule-triggered rules.
    pub fn schedule_rules(&self) -> Vec<RemediationRule> {
        let mut rules: Vec<_> = self
            .rules
            .read()
            .values()
            .filter(|r| r.enabled && r.trigger.trigger_type == TriggerType::Schedule)
            .cloned()
            .collect();
        sort_rules(&mut rules);
        rules
    }

    /// Atomically check the rule's cooldown and, if it has elapsed, stamp
    /// `last_triggered = now`. Returns `None` when the rule is unknown or
    /// still cooling down.
    pub fn try_claim(
        &self,
        id: &RuleId,
        now: DateTime<Utc>,
        default_cooldown: Duration,
    ) -> Option<CooldownClaim> {
        let mut guard = self.rules.write();
        let rule = guard.get_mut(id)?;
        if !cooldown_elapsed(rule, now, default_cooldown) {
            return None;
        }
        let previous = rule.last_triggered.replace(now);
        Some(CooldownClaim { at: now, previous })
    }

    /// Undo a claim whose action was never submitted.
    ///
    /// A no-op when `last_triggered` has moved past the claim since.
    pub fn release(&self, id: &RuleId, claim: CooldownClaim) {
        let mut guard = self.rules.write();
        if let Some(rule) = guard.get_mut(id) {
            if rule.last_triggered == Some(claim.at) {
                rule.last_triggered = claim.previous;
            }
        }
    }

    /// Record a finished run: stamp `last_triggered` and bump the count.
    /// Returns the updated rule.
    pub fn record_execution(&self, id: &RuleId, at: DateTime<Utc>) -> Option<RemediationRule> {
        let mut guard = self.rules.write();
        let rule = guard.get_mut(id)?;
        rule.last_triggered = Some(rule.last_triggered.map_or(at, |last| last.max(at)));
        rule.execution_count += 1;
        Some(rule.clone())
    }
}

/// A cooldown stamp taken by [`RuleRegistry::try_claim`], with the value
/// it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownClaim {
    pub at: DateTime<Utc>,
    pub previous: Option<DateTime<Utc>>,
}

fn sort_rules(rules: &mut [RemediationRule]) {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
}
