//! Per-message ingestion: resolve, persist, broadcast, evaluate.

use std::sync::Arc;

use pinwatch_core::payload::{parse_pin_payload, PayloadError};
use pinwatch_core::topic::parse_ingest_topic;
use pinwatch_core::types::DbId;
use pinwatch_db::models::device::DeviceIdentity;
use pinwatch_db::models::telemetry::NewTelemetrySample;

use crate::alerts::{EvaluationReport, ThresholdEngine};
use crate::notifications::AlertTrigger;
use crate::store::{RetryPolicy, TelemetryStore};
use crate::ws::{PinUpdate, WsManager};

/// What happened to one inbound device message.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Topic is not `device/<secret>/...`.
    InvalidTopic,
    /// The device lookup itself failed.
    LookupFailed,
    /// No device has this secret.
    UnknownDevice,
    /// The payload is not a flat JSON object.
    InvalidPayload(PayloadError),
    /// The telemetry write failed after all retries.
    StorageFailed,
    /// Samples were persisted, broadcast and evaluated.
    Processed(IngestSummary),
}

/// Result of a fully processed message.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub device_id: DbId,
    pub samples_written: usize,
    pub rejected_pins: usize,
    /// Sum over all pins of the number of connections each update reached.
    pub broadcasts: usize,
    /// One report per accepted pin, in payload order.
    pub evaluations: Vec<EvaluationReport>,
}

impl IngestSummary {
    /// Wait for every push attempt started while processing this message.
    pub async fn join_pushes(self) {
        for evaluation in self.evaluations {
            evaluation.join_pushes().await;
        }
    }
}

/// Handles device messages independently of the transport that delivered them.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn TelemetryStore>,
    ws_manager: Arc<WsManager>,
    engine: ThresholdEngine,
    storage_retry: RetryPolicy,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        ws_manager: Arc<WsManager>,
        engine: ThresholdEngine,
        storage_retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            ws_manager,
            engine,
            storage_retry,
        }
    }

    /// Process one message published on `topic`.
    ///
    /// Malformed input and storage failures are logged and drop the message
    /// (or just the offending pin); nothing is reported back to the device.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> IngestOutcome {
        let secret = match parse_ingest_topic(topic) {
            Ok(secret) => secret,
            Err(e) => {
                tracing::warn!(topic, error = %e, "Dropping message on invalid topic");
                return IngestOutcome::InvalidTopic;
            }
        };

        let device = match self.store.resolve_device_by_secret(secret).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                tracing::warn!(topic, "Dropping message from unknown device");
                return IngestOutcome::UnknownDevice;
            }
            Err(e) => {
                tracing::error!(topic, error = %e, "Device lookup failed");
                return IngestOutcome::LookupFailed;
            }
        };
        let device_id = device.device_id;

        let parsed = match parse_pin_payload(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(device_id, error = %e, "Dropping malformed payload");
                return IngestOutcome::InvalidPayload(e);
            }
        };
        for rejected in &parsed.rejected {
            tracing::warn!(
                device_id,
                pin = %rejected.pin,
                raw = %rejected.raw,
                "Rejected non-numeric pin value"
            );
        }

        let mut summary = IngestSummary {
            device_id,
            rejected_pins: parsed.rejected.len(),
            ..Default::default()
        };
        if parsed.is_empty() {
            tracing::debug!(device_id, "Payload carried no numeric pins");
            return IngestOutcome::Processed(summary);
        }

        let recorded_at = chrono::Utc::now();
        let samples: Vec<NewTelemetrySample> = parsed
            .values
            .iter()
            .map(|(pin, value)| NewTelemetrySample {
                device_id,
                pin: pin.clone(),
                value: *value,
                recorded_at,
            })
            .collect();

        if let Err(e) = self
            .storage_retry
            .run("append_telemetry", || self.store.append_telemetry(&samples))
            .await
        {
            tracing::error!(device_id, samples = samples.len(), error = %e, "Failed to persist telemetry");
            return IngestOutcome::StorageFailed;
        }
        summary.samples_written = samples.len();

        for sample in &samples {
            let update = PinUpdate::new(device_id, &sample.pin, sample.value, recorded_at);
            summary.broadcasts += self.ws_manager.broadcast_update(&update);
        }

        for sample in &samples {
            let evaluation = self.evaluate(device, &sample.pin, sample.value).await;
            summary.evaluations.push(evaluation);
        }

        tracing::debug!(
            device_id,
            samples = summary.samples_written,
            broadcasts = summary.broadcasts,
            "Telemetry message processed"
        );
        IngestOutcome::Processed(summary)
    }

    async fn evaluate(&self, device: DeviceIdentity, pin: &str, value: f64) -> EvaluationReport {
        self.engine
            .evaluate_sample(AlertTrigger { device, pin, value })
            .await
    }
}
