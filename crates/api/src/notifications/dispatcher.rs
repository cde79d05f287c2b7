//! Alert fan-out to organization members.
//!
//! [`NotificationDispatcher`] turns one rising-edge alert into one inbox
//! notification and one push delivery per accepted member of the device's
//! organization. The inbox write and the pushes are independent: neither
//! waits on nor rolls back the other.

use std::sync::Arc;

use pinwatch_core::channels::NOTIFICATION_TYPE_ALERT;
use pinwatch_core::types::DbId;
use pinwatch_db::models::device::DeviceIdentity;
use pinwatch_db::models::notification::NewInboxNotification;
use pinwatch_db::models::threshold_rule::ThresholdRule;
use pinwatch_events::{PushData, PushSender};
use tokio::task::JoinHandle;

use crate::error::PipelineResult;
use crate::store::TelemetryStore;

/// The sample that caused a rule to fire.
#[derive(Debug, Clone, Copy)]
pub struct AlertTrigger<'a> {
    pub device: DeviceIdentity,
    pub pin: &'a str,
    pub value: f64,
}

/// What a single dispatch did.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub rule_id: DbId,
    /// Accepted members the alert was addressed to.
    pub recipients: usize,
    /// Whether the inbox batch was written.
    pub inbox_persisted: bool,
    /// One detached task per push attempt.
    pub push_tasks: Vec<JoinHandle<()>>,
}

impl DispatchReport {
    /// Wait for every push attempt of this dispatch to finish.
    pub async fn join_pushes(self) {
        for task in self.push_tasks {
            let _ = task.await;
        }
    }
}

/// Persists inbox notifications and starts push deliveries for fired rules.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn TelemetryStore>,
    push: Option<Arc<dyn PushSender>>,
}

impl NotificationDispatcher {
    /// `push = None` disables push delivery; inbox notifications are still written.
    pub fn new(store: Arc<dyn TelemetryStore>, push: Option<Arc<dyn PushSender>>) -> Self {
        Self { store, push }
    }

    /// Notify every accepted member of the device's organization about `rule`.
    ///
    /// Fails only if the member lookup fails. Inbox and push failures are
    /// logged and reflected in the report.
    pub async fn dispatch(
        &self,
        rule: &ThresholdRule,
        trigger: AlertTrigger<'_>,
    ) -> PipelineResult<DispatchReport> {
        let organization_id = trigger.device.organization_id;
        let members = self.store.accepted_members_of(organization_id).await?;

        let mut report = DispatchReport {
            rule_id: rule.id,
            recipients: members.len(),
            ..Default::default()
        };

        if members.is_empty() {
            tracing::debug!(rule_id = rule.id, organization_id, "Alert has no accepted members");
            return Ok(report);
        }

        let now = chrono::Utc::now();
        let rows: Vec<NewInboxNotification> = members
            .iter()
            .map(|&user_id| NewInboxNotification {
                user_id,
                subject: rule.subject.clone(),
                message: rule.message.clone(),
                notification_type: NOTIFICATION_TYPE_ALERT.to_string(),
                created_at: now,
            })
            .collect();

        match self.store.insert_inbox_notifications(&rows).await {
            Ok(inserted) => {
                report.inbox_persisted = true;
                tracing::info!(rule_id = rule.id, inserted, "Alert inbox notifications written");
            }
            Err(e) => {
                tracing::error!(
                    rule_id = rule.id,
                    organization_id,
                    error = %e,
                    "Failed to write alert inbox notifications"
                );
            }
        }

        if let Some(push) = &self.push {
            let data = Arc::new(push_data(rule, &trigger));
            let title: Arc<str> = Arc::from(rule.subject.as_str());
            let body: Arc<str> = Arc::from(rule.message.as_str());

            report.push_tasks = members
                .iter()
                .map(|&user_id| {
                    let push = Arc::clone(push);
                    let data = Arc::clone(&data);
                    let title = Arc::clone(&title);
                    let body = Arc::clone(&body);
                    let rule_id = rule.id;
                    tokio::spawn(async move {
                        match push.send_push(user_id, &title, &body, &data).await {
                            Ok(()) => tracing::debug!(rule_id, user_id, "Alert push delivered"),
                            Err(e) => tracing::warn!(
                                rule_id,
                                user_id,
                                error = %e,
                                "Alert push delivery failed"
                            ),
                        }
                    })
                })
                .collect();
        }

        Ok(report)
    }
}

/// String data attached to every push of one alert.
fn push_data(rule: &ThresholdRule, trigger: &AlertTrigger<'_>) -> PushData {
    let mut data = PushData::new();
    data.insert("ruleId".into(), rule.id.to_string());
    data.insert("deviceId".into(), trigger.device.device_id.to_string());
    data.insert("pin".into(), trigger.pin.to_string());
    data.insert("value".into(), trigger.value.to_string());
    data
}
