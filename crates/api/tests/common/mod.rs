//! Shared fixtures for the pipeline integration tests: an in-memory
//! `TelemetryStore`, a recording `PushSender` and builders that wire them
//! into the real engine and pipeline.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pinwatch_api::alerts::ThresholdEngine;
use pinwatch_api::config::ServerConfig;
use pinwatch_api::ingest::IngestPipeline;
use pinwatch_api::notifications::NotificationDispatcher;
use pinwatch_api::store::{RetryPolicy, TelemetryStore};
use pinwatch_api::ws::WsManager;
use pinwatch_core::types::{DbId, Timestamp};
use pinwatch_db::models::device::DeviceIdentity;
use pinwatch_db::models::notification::NewInboxNotification;
use pinwatch_db::models::telemetry::NewTelemetrySample;
use pinwatch_db::models::threshold_rule::ThresholdRule;
use pinwatch_events::{PushData, PushError, PushSender};

pub const SECRET: &str = "s3cr3t";
pub const DEVICE: DeviceIdentity = DeviceIdentity {
    device_id: 7,
    organization_id: 100,
};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    devices: HashMap<String, DeviceIdentity>,
    telemetry: Vec<NewTelemetrySample>,
    rules: Vec<ThresholdRule>,
    members: HashMap<DbId, Vec<DbId>>,
    inbox: Vec<NewInboxNotification>,
    rule_lookups: usize,
    append_failures: u32,
    append_attempts: u32,
    fail_rule_updates: bool,
    fail_inbox: bool,
    yield_after_rule_lookup: bool,
}

/// In-memory `TelemetryStore` with failure injection.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_device(&self, secret: &str, device: DeviceIdentity) {
        self.state
            .lock()
            .unwrap()
            .devices
            .insert(secret.to_string(), device);
    }

    pub fn add_rule(&self, id: DbId, device_id: DbId, pin: &str, comparator: &str, threshold: f64) {
        self.state.lock().unwrap().rules.push(ThresholdRule {
            id,
            device_id,
            pin: pin.to_string(),
            subject: format!("Rule {id} fired"),
            message: format!("{pin} {comparator} {threshold}"),
            comparator: comparator.to_string(),
            threshold,
            is_active: true,
            last_triggered: false,
            last_triggered_at: None,
        });
    }

    pub fn deactivate_rule(&self, id: DbId) {
        if let Some(rule) = self.state.lock().unwrap().rules.iter_mut().find(|r| r.id == id) {
            rule.is_active = false;
        }
    }

    pub fn set_members(&self, organization_id: DbId, user_ids: &[DbId]) {
        self.state
            .lock()
            .unwrap()
            .members
            .insert(organization_id, user_ids.to_vec());
    }

    pub fn rule(&self, id: DbId) -> ThresholdRule {
        self.state
            .lock()
            .unwrap()
            .rules
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .expect("rule exists")
    }

    pub fn set_rule_edge(&self, id: DbId, last_triggered: bool, at: Option<Timestamp>) {
        let mut state = self.state.lock().unwrap();
        let rule = state.rules.iter_mut().find(|r| r.id == id).expect("rule exists");
        rule.last_triggered = last_triggered;
        rule.last_triggered_at = at;
    }

    pub fn telemetry(&self) -> Vec<NewTelemetrySample> {
        self.state.lock().unwrap().telemetry.clone()
    }

    pub fn inbox(&self) -> Vec<NewInboxNotification> {
        self.state.lock().unwrap().inbox.clone()
    }

    pub fn rule_lookups(&self) -> usize {
        self.state.lock().unwrap().rule_lookups
    }

    pub fn append_attempts(&self) -> u32 {
        self.state.lock().unwrap().append_attempts
    }

    /// Fail the next `n` telemetry appends.
    pub fn fail_appends(&self, n: u32) {
        self.state.lock().unwrap().append_failures = n;
    }

    pub fn fail_rule_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_rule_updates = fail;
    }

    pub fn fail_inbox(&self, fail: bool) {
        self.state.lock().unwrap().fail_inbox = fail;
    }

    /// Suspend after loading rules so concurrent evaluations read the same
    /// edge state before either writes.
    pub fn yield_after_rule_lookup(&self, enabled: bool) {
        self.state.lock().unwrap().yield_after_rule_lookup = enabled;
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn resolve_device_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<DeviceIdentity>, sqlx::Error> {
        Ok(self.state.lock().unwrap().devices.get(secret).copied())
    }

    async fn append_telemetry(&self, samples: &[NewTelemetrySample]) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        state.append_attempts += 1;
        if state.append_failures > 0 {
            state.append_failures -= 1;
            return Err(sqlx::Error::PoolTimedOut);
        }
        state.telemetry.extend_from_slice(samples);
        Ok(samples.len() as u64)
    }

    async fn active_rules_for(
        &self,
        device_id: DbId,
        pin: &str,
    ) -> Result<Vec<ThresholdRule>, sqlx::Error> {
        let (rules, yield_now) = {
            let mut state = self.state.lock().unwrap();
            state.rule_lookups += 1;
            let rules: Vec<ThresholdRule> = state
                .rules
                .iter()
                .filter(|r| r.device_id == device_id && r.pin == pin && r.is_active)
                .cloned()
                .collect();
            (rules, state.yield_after_rule_lookup)
        };
        if yield_now {
            tokio::task::yield_now().await;
        }
        Ok(rules)
    }

    async fn update_rule_edge_state(
        &self,
        rule_id: DbId,
        last_triggered: bool,
        last_triggered_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_rule_updates {
            return Err(sqlx::Error::PoolTimedOut);
        }
        match state
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id && r.last_triggered != last_triggered)
        {
            Some(rule) => {
                rule.last_triggered = last_triggered;
                if last_triggered_at.is_some() {
                    rule.last_triggered_at = last_triggered_at;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn accepted_members_of(&self, organization_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .members
            .get(&organization_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_inbox_notifications(
        &self,
        notifications: &[NewInboxNotification],
    ) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_inbox {
            return Err(sqlx::Error::PoolTimedOut);
        }
        state.inbox.extend_from_slice(notifications);
        Ok(notifications.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// RecordingPush
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SentPush {
    pub user_id: DbId,
    pub title: String,
    pub body: String,
    pub data: PushData,
}

/// `PushSender` that records every attempt and fails for selected users.
#[derive(Default)]
pub struct RecordingPush {
    attempts: Mutex<Vec<SentPush>>,
    failing_users: Mutex<HashSet<DbId>>,
}

impl RecordingPush {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, user_id: DbId) {
        self.failing_users.lock().unwrap().insert(user_id);
    }

    pub fn attempts(&self) -> Vec<SentPush> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempted_users(&self) -> Vec<DbId> {
        let mut users: Vec<DbId> = self.attempts().iter().map(|p| p.user_id).collect();
        users.sort_unstable();
        users
    }
}

#[async_trait]
impl PushSender for RecordingPush {
    async fn send_push(
        &self,
        user_id: DbId,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<(), PushError> {
        self.attempts.lock().unwrap().push(SentPush {
            user_id,
            title: title.to_string(),
            body: body.to_string(),
            data: data.clone(),
        });
        if self.failing_users.lock().unwrap().contains(&user_id) {
            return Err(PushError::HttpStatus(500));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn build_engine(
    store: &Arc<MemoryStore>,
    push: &Arc<RecordingPush>,
    equality_tolerance: f64,
) -> ThresholdEngine {
    let store: Arc<dyn TelemetryStore> = store.clone();
    let push: Arc<dyn PushSender> = push.clone();
    let dispatcher = NotificationDispatcher::new(Arc::clone(&store), Some(push));
    ThresholdEngine::new(store, dispatcher, equality_tolerance, RetryPolicy::default())
}

pub fn build_pipeline(
    store: &Arc<MemoryStore>,
    push: &Arc<RecordingPush>,
    ws_manager: &Arc<WsManager>,
    storage_retry: RetryPolicy,
) -> IngestPipeline {
    let engine = build_engine(store, push, 0.0);
    let store: Arc<dyn TelemetryStore> = store.clone();
    IngestPipeline::new(store, Arc::clone(ws_manager), engine, storage_retry)
}

/// `ServerConfig` with safe test defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        realtime_port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        mqtt: pinwatch_api::config::MqttConfig {
            broker_url: "mqtt://127.0.0.1:1883".to_string(),
            client_id: "pinwatch-test".to_string(),
            topic_filter: "device/+/#".to_string(),
            retry_delay: std::time::Duration::from_secs(1),
        },
        pipeline: Default::default(),
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// The production API router over `pool`, with a fresh connection registry.
pub fn build_test_app(pool: sqlx::PgPool) -> axum::Router {
    let config = test_config();
    let state = pinwatch_api::state::AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
    };
    pinwatch_api::router::build_app_router(state, &config)
}

/// Send a GET request through the router.
pub async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    use tower::ServiceExt;

    let request = axum::http::Request::builder()
        .method(axum::http::Method::GET)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    use http_body_util::BodyExt;

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
