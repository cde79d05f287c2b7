//! Edge-triggered threshold evaluation.
//!
//! Each rule persists whether its condition held at the previous evaluation.
//! A rule notifies only on the transition from not-holding to holding, so a
//! sustained breach produces exactly one alert and the rule re-arms once the
//! condition clears.

use std::sync::Arc;

use pinwatch_core::thresholds::{compare, detect_edge, Comparator, EdgeTransition};
use pinwatch_db::models::threshold_rule::ThresholdRule;

use crate::error::PipelineResult;
use crate::notifications::{AlertTrigger, DispatchReport, NotificationDispatcher};
use crate::store::{RetryPolicy, TelemetryStore};

/// Summary of evaluating every active rule for one `(device, pin, value)`.
#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub rules_evaluated: usize,
    pub rising: usize,
    pub falling: usize,
    /// Rules skipped because of a bad comparator or a failed write.
    pub failed: usize,
    pub dispatches: Vec<DispatchReport>,
}

impl EvaluationReport {
    /// Wait for every push attempt started by this evaluation.
    pub async fn join_pushes(self) {
        for dispatch in self.dispatches {
            dispatch.join_pushes().await;
        }
    }
}

/// Evaluates threshold rules and dispatches alerts on rising edges.
#[derive(Clone)]
pub struct ThresholdEngine {
    store: Arc<dyn TelemetryStore>,
    dispatcher: NotificationDispatcher,
    equality_tolerance: f64,
    storage_retry: RetryPolicy,
}

impl ThresholdEngine {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        dispatcher: NotificationDispatcher,
        equality_tolerance: f64,
        storage_retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            equality_tolerance,
            storage_retry,
        }
    }

    /// Evaluate every active rule on `trigger.pin` against `trigger.value`.
    ///
    /// Rules are independent: a failure on one is logged and the rest are
    /// still evaluated.
    pub async fn evaluate_sample(&self, trigger: AlertTrigger<'_>) -> EvaluationReport {
        let device_id = trigger.device.device_id;
        let mut report = EvaluationReport::default();

        let rules = match self.store.active_rules_for(device_id, trigger.pin).await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(device_id, pin = trigger.pin, error = %e, "Failed to load threshold rules");
                return report;
            }
        };

        for rule in &rules {
            report.rules_evaluated += 1;
            match self.evaluate_rule(rule, trigger).await {
                Ok((EdgeTransition::Rising, dispatch)) => {
                    report.rising += 1;
                    report.dispatches.extend(dispatch);
                }
                Ok((EdgeTransition::Falling, _)) => report.falling += 1,
                Ok((EdgeTransition::Steady, _)) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        rule_id = rule.id,
                        device_id,
                        pin = trigger.pin,
                        error = %e,
                        "Threshold rule evaluation failed"
                    );
                }
            }
        }

        report
    }

    /// Evaluate one rule and apply its edge transition.
    ///
    /// The new edge state is persisted before any notification goes out; if
    /// that write fails the rule is left untouched and nothing is sent, so the
    /// next sample re-detects the same edge. The write only applies when the
    /// stored flag still differs, so when concurrent samples see the same edge
    /// only the one whose write lands dispatches.
    async fn evaluate_rule(
        &self,
        rule: &ThresholdRule,
        trigger: AlertTrigger<'_>,
    ) -> PipelineResult<(EdgeTransition, Option<DispatchReport>)> {
        let comparator: Comparator = rule.comparator.parse()?;
        let currently_triggered = compare(
            trigger.value,
            rule.threshold,
            comparator,
            self.equality_tolerance,
        );
        let edge = detect_edge(rule.last_triggered, currently_triggered);

        match edge {
            EdgeTransition::Steady => Ok((edge, None)),
            EdgeTransition::Falling => {
                if !self.persist_edge(rule, false, None).await? {
                    return Ok((EdgeTransition::Steady, None));
                }
                tracing::info!(rule_id = rule.id, value = trigger.value, "Threshold rule cleared");
                Ok((edge, None))
            }
            EdgeTransition::Rising => {
                if !self.persist_edge(rule, true, Some(chrono::Utc::now())).await? {
                    return Ok((EdgeTransition::Steady, None));
                }
                tracing::info!(
                    rule_id = rule.id,
                    device_id = trigger.device.device_id,
                    pin = trigger.pin,
                    value = trigger.value,
                    comparator = %comparator,
                    threshold = rule.threshold,
                    "Threshold rule triggered"
                );
                let dispatch = self.dispatcher.dispatch(rule, trigger).await?;
                Ok((edge, Some(dispatch)))
            }
        }
    }

    /// Returns `false` when the transition was already applied elsewhere.
    async fn persist_edge(
        &self,
        rule: &ThresholdRule,
        last_triggered: bool,
        last_triggered_at: Option<pinwatch_core::types::Timestamp>,
    ) -> PipelineResult<bool> {
        let applied = self
            .storage_retry
            .run("update_rule_edge_state", || {
                self.store
                    .update_rule_edge_state(rule.id, last_triggered, last_triggered_at)
            })
            .await?;
        if !applied {
            tracing::debug!(
                rule_id = rule.id,
                last_triggered,
                "Edge state already applied by a concurrent evaluation"
            );
        }
        Ok(applied)
    }
}
