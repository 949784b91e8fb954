use crate::types::BotHealth;
use chrono::{DateTime, Utc};
use foreman_audit::{AuditEvent, AuditOutcome, EventSink};
use foreman_core::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Memory percentage above which the controller degrades.
const MEMORY_DEGRADE_PERCENT: f64 = 85.0;
/// CPU percentage above which the controller degrades.
const CPU_DEGRADE_PERCENT: f64 = 90.0;
/// Healthy-worker fraction below which the controller degrades.
const BOT_FAILURE_FRACTION: f64 = 0.5;
/// Recovery requires memory and CPU both below this.
const RECOVERY_RESOURCE_PERCENT: f64 = 70.0;
/// Recovery requires at least this fraction of workers healthy.
const RECOVERY_HEALTHY_FRACTION: f64 = 0.8;
/// Weight of CPU load in fallback bot scoring.
const FALLBACK_CPU_WEIGHT: f64 = 0.1;

/// Operating mode of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradationMode {
    /// All features active.
    Full,
    /// Reduced feature set, driven by a single active cause.
    Degraded,
    /// Operator-driven state with only critical features active.
    Maintenance,
}

/// Why the controller left Full mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationCause {
    /// Too few workers are healthy.
    BotFailure,
    /// Memory usage crossed the degrade threshold.
    MemoryPressure,
    /// CPU usage crossed the degrade threshold.
    HighLoad,
    /// An operator degraded the system by hand.
    Manual,
    /// An upstream dependency is failing.
    DependencyFailure,
}

/// How essential a feature is to keeping work flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    /// Never disabled.
    Critical,
    /// Disabled under most degrade causes.
    Important,
    /// Disabled in every non-Full mode.
    Optional,
}

/// The feature catalog with per-feature criticality tiers.
pub const FEATURES: &[(&str, Criticality)] = &[
    ("task-routing", Criticality::Critical),
    ("message-delivery", Criticality::Critical),
    ("health-monitoring", Criticality::Critical),
    ("adaptive-scheduling", Criticality::Important),
    ("auto-scaling", Criticality::Important),
    ("analytics", Criticality::Optional),
    ("predictive-scaling", Criticality::Optional),
];

fn features_of(tier: Criticality) -> impl Iterator<Item = &'static str> {
    FEATURES
        .iter()
        .filter(move |(_, c)| *c == tier)
        .map(|(name, _)| *name)
}

/// Per-feature line in a [`DegradationStatus`] report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureStatus {
    /// Whether the feature is currently active.
    pub enabled: bool,
    /// The feature's tier.
    pub criticality: Criticality,
}

/// Worker pool counts in a [`DegradationStatus`] report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotPoolStatus {
    /// Workers currently healthy.
    pub active: usize,
    /// Workers known to the pool.
    pub total: usize,
    /// `active / total` as a percentage; 100 for an empty pool.
    pub percentage: f64,
}

/// Snapshot of the controller for status endpoints and operators.
#[derive(Debug, Clone, Serialize)]
pub struct DegradationStatus {
    /// Current operating mode.
    pub mode: DegradationMode,
    /// Active cause, if the system is not Full.
    pub cause: Option<DegradationCause>,
    /// Names of currently disabled features, sorted.
    pub disabled_features: Vec<String>,
    /// Enablement and tier of every catalog feature.
    pub feature_status: BTreeMap<String, FeatureStatus>,
    /// Worker pool counts.
    pub bot_status: BotPoolStatus,
    /// Queue capacity as a percentage of the full pool.
    pub queue_capacity_percent: f64,
    /// Milliseconds spent in the current mode.
    pub time_in_mode_ms: i64,
}

struct Inner {
    mode: DegradationMode,
    cause: Option<DegradationCause>,
    disabled: BTreeSet<String>,
    active_bots: usize,
    total_bots: usize,
    last_transition: DateTime<Utc>,
}

/// Converts resource and health signals into admission-control decisions.
///
/// Maintains the Full / Degraded / Maintenance mode machine and the
/// feature-enablement policy, and selects fallback workers under degraded
/// conditions. Invariant: Full mode always has an empty disabled set and no
/// cause; Degraded and Maintenance always carry a policy-determined
/// non-empty disabled set.
pub struct DegradationController {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    inner: Arc<RwLock<Inner>>,
}

impl DegradationController {
    /// Create a controller in Full mode.
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn EventSink>) -> Self {
        let now = clock.now();
        Self {
            clock,
            sink,
            inner: Arc::new(RwLock::new(Inner {
                mode: DegradationMode::Full,
                cause: None,
                disabled: BTreeSet::new(),
                active_bots: 0,
                total_bots: 0,
                last_transition: now,
            })),
        }
    }

    /// Features disabled for a given degrade cause.
    fn disabled_set_for(cause: DegradationCause) -> BTreeSet<String> {
        let mut disabled: BTreeSet<String> =
            features_of(Criticality::Optional).map(String::from).collect();
        match cause {
            DegradationCause::MemoryPressure => {
                disabled.extend(features_of(Criticality::Important).map(String::from));
            }
            DegradationCause::HighLoad => {
                disabled.insert("adaptive-scheduling".to_string());
            }
            DegradationCause::BotFailure => {
                disabled.insert("auto-scaling".to_string());
            }
            DegradationCause::Manual | DegradationCause::DependencyFailure => {}
        }
        disabled
    }

    /// Enter Degraded mode for `cause`.
    ///
    /// Returns false without any state change when already Degraded: a
    /// single active cause is enforced, and the caller must return to Full
    /// before degrading again.
    pub async fn transition_to_degraded(&self, cause: DegradationCause) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        if inner.mode == DegradationMode::Degraded {
            warn!(?cause, active = ?inner.cause, "degrade refused: already degraded");
            self.audit(now, "transition_to_degraded", AuditOutcome::Rejected, &inner);
            return false;
        }

        inner.mode = DegradationMode::Degraded;
        inner.cause = Some(cause);
        inner.disabled = Self::disabled_set_for(cause);
        inner.last_transition = now;
        warn!(?cause, disabled = inner.disabled.len(), "entering degraded mode");
        self.audit(now, "transition_to_degraded", AuditOutcome::Applied, &inner);
        true
    }

    /// Return to Full mode, clearing the cause and the disabled set.
    /// Returns false when already Full.
    pub async fn transition_to_full(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        if inner.mode == DegradationMode::Full {
            self.audit(now, "transition_to_full", AuditOutcome::Rejected, &inner);
            return false;
        }

        inner.mode = DegradationMode::Full;
        inner.cause = None;
        inner.disabled.clear();
        inner.last_transition = now;
        info!("returning to full mode");
        self.audit(now, "transition_to_full", AuditOutcome::Applied, &inner);
        true
    }

    /// Enter Maintenance mode from any mode, disabling every Important and
    /// Optional feature. Returns false only when already in Maintenance.
    pub async fn transition_to_maintenance(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        if inner.mode == DegradationMode::Maintenance {
            self.audit(now, "transition_to_maintenance", AuditOutcome::Rejected, &inner);
            return false;
        }

        inner.mode = DegradationMode::Maintenance;
        inner.cause = None;
        inner.disabled = features_of(Criticality::Important)
            .chain(features_of(Criticality::Optional))
            .map(String::from)
            .collect();
        inner.last_transition = now;
        info!("entering maintenance mode");
        self.audit(now, "transition_to_maintenance", AuditOutcome::Applied, &inner);
        true
    }

    /// Periodic monitoring tick: evaluate degrade conditions in priority
    /// order and fire at most one, or recover to Full when everything is
    /// healthy again.
    ///
    /// Degrade thresholds (checked only when not already Degraded):
    /// memory > 85 % → MemoryPressure; cpu > 90 % → HighLoad;
    /// healthy fraction < 50 % → BotFailure. Recovery (checked only when
    /// Degraded): memory < 70 %, cpu < 70 %, healthy fraction > 80 %.
    /// A single call never both degrades and recovers. Returns the cause
    /// fired, if any.
    pub async fn apply_resource_constraints(
        &self,
        memory_percent: f64,
        cpu_percent: f64,
        active_bots: usize,
        total_bots: usize,
    ) -> Option<DegradationCause> {
        let currently_degraded = {
            let mut inner = self.inner.write().await;
            inner.active_bots = active_bots;
            inner.total_bots = total_bots;
            inner.mode == DegradationMode::Degraded
        };

        let healthy_fraction = if total_bots == 0 {
            1.0
        } else {
            active_bots as f64 / total_bots as f64
        };

        if !currently_degraded {
            let cause = if memory_percent > MEMORY_DEGRADE_PERCENT {
                Some(DegradationCause::MemoryPressure)
            } else if cpu_percent > CPU_DEGRADE_PERCENT {
                Some(DegradationCause::HighLoad)
            } else if healthy_fraction < BOT_FAILURE_FRACTION {
                Some(DegradationCause::BotFailure)
            } else {
                None
            };
            if let Some(cause) = cause {
                warn!(
                    memory = memory_percent,
                    cpu = cpu_percent,
                    healthy = healthy_fraction,
                    ?cause,
                    "resource constraints triggered degradation"
                );
                self.transition_to_degraded(cause).await;
                return Some(cause);
            }
            return None;
        }

        if memory_percent < RECOVERY_RESOURCE_PERCENT
            && cpu_percent < RECOVERY_RESOURCE_PERCENT
            && healthy_fraction > RECOVERY_HEALTHY_FRACTION
        {
            info!(
                memory = memory_percent,
                cpu = cpu_percent,
                healthy = healthy_fraction,
                "resources recovered; returning to full mode"
            );
            self.transition_to_full().await;
        }
        None
    }

    /// Select the fallback worker maximizing `success_rate − 0.1 × cpu`.
    ///
    /// Candidates without a health entry are skipped. Equal utility resolves
    /// to the lexicographically smallest bot id so repeated runs agree.
    /// Returns `None` for an empty candidate list.
    pub fn get_fallback_bot(
        &self,
        candidates: &[String],
        health: &HashMap<String, BotHealth>,
    ) -> Option<String> {
        let mut sorted: Vec<&String> = candidates.iter().collect();
        sorted.sort();

        let mut best: Option<(&String, f64)> = None;
        for candidate in sorted {
            let Some(h) = health.get(candidate) else {
                continue;
            };
            let utility = h.success_rate - FALLBACK_CPU_WEIGHT * h.cpu_fraction;
            match best {
                Some((_, best_utility)) if utility <= best_utility => {}
                _ => best = Some((candidate, utility)),
            }
        }
        best.map(|(id, _)| id.clone())
    }

    /// Whether a feature is currently active. Always true in Full mode;
    /// otherwise true unless the feature is in the disabled set.
    pub async fn is_feature_enabled(&self, name: &str) -> bool {
        let inner = self.inner.read().await;
        inner.mode == DegradationMode::Full || !inner.disabled.contains(name)
    }

    /// Current operating mode.
    pub async fn mode(&self) -> DegradationMode {
        self.inner.read().await.mode
    }

    /// Active degrade cause, if any.
    pub async fn cause(&self) -> Option<DegradationCause> {
        self.inner.read().await.cause
    }

    /// Update the worker pool counts without evaluating constraints.
    pub async fn set_worker_counts(&self, active: usize, total: usize) {
        let mut inner = self.inner.write().await;
        inner.active_bots = active;
        inner.total_bots = total;
    }

    /// Build a full status report for operators and status endpoints.
    pub async fn status(&self) -> DegradationStatus {
        let inner = self.inner.read().await;
        let full = inner.mode == DegradationMode::Full;

        let feature_status: BTreeMap<String, FeatureStatus> = FEATURES
            .iter()
            .map(|(name, criticality)| {
                let enabled = full || !inner.disabled.contains(*name);
                (
                    (*name).to_string(),
                    FeatureStatus {
                        enabled,
                        criticality: *criticality,
                    },
                )
            })
            .collect();

        let percentage = if inner.total_bots == 0 {
            100.0
        } else {
            (inner.active_bots as f64 / inner.total_bots as f64 * 1000.0).round() / 10.0
        };

        DegradationStatus {
            mode: inner.mode,
            cause: inner.cause,
            disabled_features: inner.disabled.iter().cloned().collect(),
            feature_status,
            bot_status: BotPoolStatus {
                active: inner.active_bots,
                total: inner.total_bots,
                percentage,
            },
            queue_capacity_percent: percentage,
            time_in_mode_ms: (self.clock.now() - inner.last_transition).num_milliseconds(),
        }
    }

    fn audit(&self, now: DateTime<Utc>, action: &str, outcome: AuditOutcome, inner: &Inner) {
        self.sink.emit(
            AuditEvent::new(now, "degradation", action, outcome).with_details(
                serde_json::json!({
                    "mode": inner.mode,
                    "cause": inner.cause,
                    "disabled": inner.disabled.iter().collect::<Vec<_>>(),
                }),
            ),
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use foreman_audit::NoopSink;
    use foreman_core::ManualClock;

    fn controller() -> (Arc<ManualClock>, DegradationController) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap(),
        ));
        let controller = DegradationController::new(clock.clone(), Arc::new(NoopSink));
        (clock, controller)
    }

    #[tokio::test]
    async fn starts_full_with_everything_enabled() {
        let (_, controller) = controller();
        assert_eq!(controller.mode().await, DegradationMode::Full);
        for (name, _) in FEATURES {
            assert!(controller.is_feature_enabled(name).await, "{name}");
        }
    }

    #[tokio::test]
    async fn memory_pressure_disables_important_and_optional() {
        let (_, controller) = controller();
        assert!(
            controller
                .transition_to_degraded(DegradationCause::MemoryPressure)
                .await
        );

        assert!(controller.is_feature_enabled("task-routing").await);
        assert!(controller.is_feature_enabled("message-delivery").await);
        assert!(!controller.is_feature_enabled("adaptive-scheduling").await);
        assert!(!controller.is_feature_enabled("auto-scaling").await);
        assert!(!controller.is_feature_enabled("analytics").await);
        assert!(!controller.is_feature_enabled("predictive-scaling").await);
    }

    #[tokio::test]
    async fn high_load_disables_adaptive_scheduling_and_optional() {
        let (_, controller) = controller();
        controller
            .transition_to_degraded(DegradationCause::HighLoad)
            .await;

        assert!(!controller.is_feature_enabled("adaptive-scheduling").await);
        assert!(controller.is_feature_enabled("auto-scaling").await);
        assert!(!controller.is_feature_enabled("analytics").await);
    }

    #[tokio::test]
    async fn bot_failure_disables_auto_scaling_and_optional() {
        let (_, controller) = controller();
        controller
            .transition_to_degraded(DegradationCause::BotFailure)
            .await;

        assert!(!controller.is_feature_enabled("auto-scaling").await);
        assert!(controller.is_feature_enabled("adaptive-scheduling").await);
        assert!(!controller.is_feature_enabled("predictive-scaling").await);
    }

    #[tokio::test]
    async fn manual_cause_disables_only_optional() {
        let (_, controller) = controller();
        controller
            .transition_to_degraded(DegradationCause::Manual)
            .await;

        assert!(controller.is_feature_enabled("adaptive-scheduling").await);
        assert!(controller.is_feature_enabled("auto-scaling").await);
        assert!(!controller.is_feature_enabled("analytics").await);
        assert!(!controller.is_feature_enabled("predictive-scaling").await);
    }

    #[tokio::test]
    async fn second_degrade_is_refused_without_state_change() {
        let (_, controller) = controller();
        assert!(
            controller
                .transition_to_degraded(DegradationCause::HighLoad)
                .await
        );
        assert!(
            !controller
                .transition_to_degraded(DegradationCause::MemoryPressure)
                .await
        );
        assert_eq!(controller.cause().await, Some(DegradationCause::HighLoad));
        // HighLoad's set is still in force: auto-scaling stays enabled.
        assert!(controller.is_feature_enabled("auto-scaling").await);
    }

    #[tokio::test]
    async fn full_transition_clears_cause_and_disabled_set() {
        let (_, controller) = controller();
        controller
            .transition_to_degraded(DegradationCause::MemoryPressure)
            .await;
        assert!(controller.transition_to_full().await);
        assert_eq!(controller.mode().await, DegradationMode::Full);
        assert_eq!(controller.cause().await, None);
        assert!(controller.status().await.disabled_features.is_empty());

        // Already Full: refused.
        assert!(!controller.transition_to_full().await);
    }

    #[tokio::test]
    async fn maintenance_reachable_from_any_mode() {
        let (_, controller) = controller();
        controller
            .transition_to_degraded(DegradationCause::HighLoad)
            .await;
        assert!(controller.transition_to_maintenance().await);
        assert_eq!(controller.mode().await, DegradationMode::Maintenance);
        assert!(!controller.is_feature_enabled("adaptive-scheduling").await);
        assert!(!controller.is_feature_enabled("auto-scaling").await);
        assert!(!controller.is_feature_enabled("analytics").await);
        assert!(controller.is_feature_enabled("task-routing").await);

        // Duplicate maintenance transition is refused.
        assert!(!controller.transition_to_maintenance().await);
    }

    #[tokio::test]
    async fn scenario_memory_probe_degrades_from_full() {
        let (_, controller) = controller();
        let fired = controller
            .apply_resource_constraints(90.0, 50.0, 5, 5)
            .await;
        assert_eq!(fired, Some(DegradationCause::MemoryPressure));
        assert_eq!(controller.mode().await, DegradationMode::Degraded);
        assert!(!controller.is_feature_enabled("adaptive-scheduling").await);
        assert!(!controller.is_feature_enabled("auto-scaling").await);
        assert!(!controller.is_feature_enabled("analytics").await);
    }

    #[tokio::test]
    async fn probe_priority_memory_over_cpu_over_bots() {
        let (_, controller) = controller();
        // Memory and CPU both hot: memory wins.
        let fired = controller
            .apply_resource_constraints(95.0, 95.0, 1, 5)
            .await;
        assert_eq!(fired, Some(DegradationCause::MemoryPressure));

        controller.transition_to_full().await;
        let fired = controller
            .apply_resource_constraints(50.0, 95.0, 1, 5)
            .await;
        assert_eq!(fired, Some(DegradationCause::HighLoad));

        controller.transition_to_full().await;
        let fired = controller
            .apply_resource_constraints(50.0, 50.0, 1, 5)
            .await;
        assert_eq!(fired, Some(DegradationCause::BotFailure));
    }

    #[tokio::test]
    async fn probe_recovers_only_when_everything_is_healthy() {
        let (_, controller) = controller();
        controller
            .apply_resource_constraints(90.0, 50.0, 5, 5)
            .await;
        assert_eq!(controller.mode().await, DegradationMode::Degraded);

        // Memory back down but CPU still hot: stay degraded.
        controller
            .apply_resource_constraints(60.0, 75.0, 5, 5)
            .await;
        assert_eq!(controller.mode().await, DegradationMode::Degraded);

        // Everything healthy: recover.
        let fired = controller
            .apply_resource_constraints(60.0, 60.0, 5, 5)
            .await;
        assert_eq!(fired, None);
        assert_eq!(controller.mode().await, DegradationMode::Full);
    }

    #[tokio::test]
    async fn one_probe_call_cannot_degrade_and_recover() {
        let (_, controller) = controller();
        controller
            .apply_resource_constraints(90.0, 50.0, 5, 5)
            .await;
        // This call recovers; it must not immediately re-degrade on the next
        // evaluation within the same call even though bots look unhealthy to
        // a fresh probe.
        controller
            .apply_resource_constraints(60.0, 60.0, 5, 5)
            .await;
        assert_eq!(controller.mode().await, DegradationMode::Full);
    }

    #[tokio::test]
    async fn stable_metrics_after_recovery_do_not_oscillate() {
        let (_, controller) = controller();
        controller
            .apply_resource_constraints(90.0, 50.0, 5, 5)
            .await;
        controller
            .apply_resource_constraints(40.0, 30.0, 5, 5)
            .await;
        assert_eq!(controller.mode().await, DegradationMode::Full);

        for _ in 0..10 {
            let fired = controller
                .apply_resource_constraints(40.0, 30.0, 5, 5)
                .await;
            assert_eq!(fired, None);
            assert_eq!(controller.mode().await, DegradationMode::Full);
        }
    }

    #[tokio::test]
    async fn fallback_bot_maximizes_utility() {
        let (_, controller) = controller();
        let candidates = vec!["b1".to_string(), "b2".to_string()];
        let mut health = HashMap::new();
        health.insert(
            "b1".to_string(),
            BotHealth {
                success_rate: 0.95,
                cpu_fraction: 0.3,
            },
        );
        health.insert(
            "b2".to_string(),
            BotHealth {
                success_rate: 0.80,
                cpu_fraction: 0.1,
            },
        );

        // 0.95 - 0.03 = 0.92 beats 0.80 - 0.01 = 0.79.
        assert_eq!(
            controller.get_fallback_bot(&candidates, &health),
            Some("b1".to_string())
        );
    }

    #[tokio::test]
    async fn fallback_tie_breaks_lexicographically() {
        let (_, controller) = controller();
        let candidates = vec!["zed".to_string(), "amy".to_string()];
        let mut health = HashMap::new();
        for id in &candidates {
            health.insert(
                id.clone(),
                BotHealth {
                    success_rate: 0.9,
                    cpu_fraction: 0.2,
                },
            );
        }
        assert_eq!(
            controller.get_fallback_bot(&candidates, &health),
            Some("amy".to_string())
        );
    }

    #[tokio::test]
    async fn fallback_empty_candidates_returns_none() {
        let (_, controller) = controller();
        assert_eq!(controller.get_fallback_bot(&[], &HashMap::new()), None);
    }

    #[tokio::test]
    async fn fallback_skips_candidates_without_health() {
        let (_, controller) = controller();
        let candidates = vec!["known".to_string(), "mystery".to_string()];
        let mut health = HashMap::new();
        health.insert(
            "known".to_string(),
            BotHealth {
                success_rate: 0.5,
                cpu_fraction: 0.9,
            },
        );
        assert_eq!(
            controller.get_fallback_bot(&candidates, &health),
            Some("known".to_string())
        );
    }

    #[tokio::test]
    async fn status_report_shape() {
        let (clock, controller) = controller();
        controller.set_worker_counts(3, 4).await;
        clock.advance(chrono::Duration::milliseconds(1500));
        controller
            .transition_to_degraded(DegradationCause::BotFailure)
            .await;
        clock.advance(chrono::Duration::milliseconds(500));

        let status = controller.status().await;
        assert_eq!(status.mode, DegradationMode::Degraded);
        assert_eq!(status.cause, Some(DegradationCause::BotFailure));
        assert!(status
            .disabled_features
            .contains(&"auto-scaling".to_string()));
        assert_eq!(status.bot_status.active, 3);
        assert_eq!(status.bot_status.total, 4);
        assert!((status.bot_status.percentage - 75.0).abs() < f64::EPSILON);
        assert_eq!(status.time_in_mode_ms, 500);

        let routing = status.feature_status.get("task-routing").unwrap();
        assert!(routing.enabled);
        assert_eq!(routing.criticality, Criticality::Critical);
        let scaling = status.feature_status.get("auto-scaling").unwrap();
        assert!(!scaling.enabled);
    }

    #[tokio::test]
    async fn mode_invariant_holds_across_transitions() {
        let (_, controller) = controller();
        let assert_invariant = |status: DegradationStatus| match status.mode {
            DegradationMode::Full => {
                assert!(status.disabled_features.is_empty());
                assert!(status.cause.is_none());
            }
            DegradationMode::Degraded | DegradationMode::Maintenance => {
                assert!(!status.disabled_features.is_empty());
            }
        };

        assert_invariant(controller.status().await);
        controller
            .transition_to_degraded(DegradationCause::Manual)
            .await;
        assert_invariant(controller.status().await);
        controller.transition_to_maintenance().await;
        assert_invariant(controller.status().await);
        controller.transition_to_full().await;
        assert_invariant(controller.status().await);
    }
}
