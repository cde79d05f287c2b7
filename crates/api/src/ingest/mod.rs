//! Device telemetry ingestion.

pub mod mqtt;
pub mod pipeline;

pub use mqtt::run_mqtt_subscriber;
pub use pipeline::{IngestOutcome, IngestPipeline, IngestSummary};
