//! MQTT transport for device telemetry.
//!
//! Subscribes to the configured filter (default `device/+/#`) and hands every
//! publish to [`IngestPipeline`] on its own task, so a slow message never
//! holds up the event loop.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument, Span};

use crate::config::MqttConfig;
use crate::ingest::pipeline::{IngestOutcome, IngestPipeline};

/// Keep-alive interval sent to the broker.
const KEEP_ALIVE_SECS: u64 = 30;

/// Capacity of the client request channel.
const CLIENT_CHANNEL_CAPACITY: usize = 100;

/// Error ending one broker session.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(#[from] rumqttc::ClientError),

    #[error("Event loop error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
}

/// Run the subscriber until `shutdown` is cancelled.
///
/// Any session error is logged and the connection is retried after
/// `config.retry_delay`. An invalid broker URL stops the subscriber.
pub async fn run_mqtt_subscriber(
    config: MqttConfig,
    pipeline: IngestPipeline,
    shutdown: CancellationToken,
) {
    tracing::info!(broker_url = %config.broker_url, topic_filter = %config.topic_filter, "Starting MQTT subscriber");

    let mut attempt: u64 = 0;
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        match run_mqtt_session(&config, &pipeline, &shutdown).await {
            Ok(()) => break,
            Err(MqttError::InvalidBrokerUrl(url)) => {
                tracing::error!(broker_url = %url, "Invalid MQTT broker URL, ingestion disabled");
                break;
            }
            Err(e) => {
                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt,
                    retry_in_secs = config.retry_delay.as_secs(),
                    "MQTT session ended, reconnecting"
                );
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(config.retry_delay) => {}
                }
            }
        }
    }

    tracing::info!("MQTT subscriber stopped");
}

/// One broker connection. Returns `Ok(())` only on shutdown.
async fn run_mqtt_session(
    config: &MqttConfig,
    pipeline: &IngestPipeline,
    shutdown: &CancellationToken,
) -> Result<(), MqttError> {
    let (host, port) = parse_broker_url(&config.broker_url)?;

    let mut options = MqttOptions::new(&config.client_id, host, port);
    options.set_keep_alive(Duration::from_secs(KEEP_ALIVE_SECS));
    options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(options, CLIENT_CHANNEL_CAPACITY);
    client
        .subscribe(&config.topic_filter, QoS::AtMostOnce)
        .await?;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => match event? {
                Event::Incoming(Packet::Publish(publish)) => {
                    let pipeline = pipeline.clone();
                    let span = info_span!(
                        parent: Span::none(),
                        "mqtt_message",
                        topic = %publish.topic,
                        payload_size = publish.payload.len(),
                    );
                    tokio::spawn(
                        async move {
                            let outcome = pipeline.handle_message(&publish.topic, &publish.payload).await;
                            if let IngestOutcome::Processed(summary) = outcome {
                                tracing::trace!(
                                    device_id = summary.device_id,
                                    samples = summary.samples_written,
                                    "Message handled"
                                );
                            }
                        }
                        .instrument(span),
                    );
                }
                Event::Incoming(Packet::ConnAck(_)) => {
                    tracing::info!(broker_url = %config.broker_url, "Connected to MQTT broker");
                }
                Event::Incoming(Packet::SubAck(_)) => {
                    tracing::debug!(topic_filter = %config.topic_filter, "MQTT subscription acknowledged");
                }
                _ => {}
            },
        }
    }
}

/// Split `mqtt://host:port`, `tcp://host:port` or `host[:port]`.
fn parse_broker_url(url: &str) -> Result<(&str, u16), MqttError> {
    let rest = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    match rest.split_once(':') {
        None if !rest.is_empty() => Ok((rest, 1883)),
        Some((host, port)) if !host.is_empty() => port
            .parse()
            .map(|port| (host, port))
            .map_err(|_| MqttError::InvalidBrokerUrl(url.to_string())),
        _ => Err(MqttError::InvalidBrokerUrl(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn broker_url_with_scheme_and_port() {
        assert_eq!(parse_broker_url("mqtt://localhost:1884").unwrap(), ("localhost", 1884));
        assert_eq!(parse_broker_url("tcp://broker.local:1883").unwrap(), ("broker.local", 1883));
    }

    #[test]
    fn broker_url_defaults_port() {
        assert_eq!(parse_broker_url("mqtt://broker.local").unwrap(), ("broker.local", 1883));
        assert_eq!(parse_broker_url("broker.local").unwrap(), ("broker.local", 1883));
    }

    #[test]
    fn broker_url_rejects_garbage() {
        assert_matches!(parse_broker_url("mqtt://host:notaport"), Err(MqttError::InvalidBrokerUrl(_)));
        assert_matches!(parse_broker_url("mqtt://"), Err(MqttError::InvalidBrokerUrl(_)));
        assert_matches!(parse_broker_url(":1883"), Err(MqttError::InvalidBrokerUrl(_)));
    }
}
