use std::time::Duration;

use crate::store::RetryPolicy;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for both listeners (default: `0.0.0.0`).
    pub host: String,
    /// Health/API port (default: `3000`).
    pub port: u16,
    /// Real-time WebSocket port (default: `3001`).
    pub realtime_port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks on shutdown (default: `5`).
    pub shutdown_timeout_secs: u64,
    /// MQTT ingestion settings.
    pub mqtt: MqttConfig,
    /// Threshold evaluation and storage settings.
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `REALTIME_PORT`         | `3001`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `5`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host,
            port: env_parse("PORT", 3000),
            realtime_port: env_parse("REALTIME_PORT", 3001),
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 5),
            mqtt: MqttConfig::from_env(),
            pipeline: PipelineConfig::from_env(),
        }
    }
}

/// MQTT broker connection used for device ingestion.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// `mqtt://host:port`, `tcp://host:port` or `host[:port]`.
    pub broker_url: String,
    pub client_id: String,
    /// Subscription filter; the second topic level is the device secret.
    pub topic_filter: String,
    /// Delay before reconnecting after a broker error.
    pub retry_delay: Duration,
}

impl MqttConfig {
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `MQTT_BROKER_URL`       | `mqtt://localhost:1883`  |
    /// | `MQTT_CLIENT_ID`        | `pinwatch-ingest`        |
    /// | `MQTT_TOPIC_FILTER`     | `device/+/#`             |
    /// | `MQTT_RETRY_DELAY_SECS` | `5`                      |
    pub fn from_env() -> Self {
        Self {
            broker_url: std::env::var("MQTT_BROKER_URL")
                .unwrap_or_else(|_| "mqtt://localhost:1883".into()),
            client_id: std::env::var("MQTT_CLIENT_ID").unwrap_or_else(|_| "pinwatch-ingest".into()),
            topic_filter: std::env::var("MQTT_TOPIC_FILTER")
                .unwrap_or_else(|_| "device/+/#".into()),
            retry_delay: Duration::from_secs(env_parse("MQTT_RETRY_DELAY_SECS", 5)),
        }
    }
}

/// Settings for threshold evaluation and storage writes.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Absolute tolerance for `=` / `!=` rules; `0.0` means exact equality.
    pub equality_tolerance: f64,
    /// Retry policy for telemetry and rule-state writes.
    pub storage_retry: RetryPolicy,
}

impl PipelineConfig {
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `EQUALITY_TOLERANCE`     | `0.0`   |
    /// | `STORAGE_WRITE_RETRIES`  | `0`     |
    /// | `STORAGE_RETRY_DELAY_MS` | `200`   |
    pub fn from_env() -> Self {
        let equality_tolerance: f64 = env_parse("EQUALITY_TOLERANCE", 0.0);
        assert!(
            equality_tolerance.is_finite() && equality_tolerance >= 0.0,
            "EQUALITY_TOLERANCE must be a non-negative number"
        );

        Self {
            equality_tolerance,
            storage_retry: RetryPolicy {
                retries: env_parse("STORAGE_WRITE_RETRIES", 0),
                delay: Duration::from_millis(env_parse("STORAGE_RETRY_DELAY_MS", 200)),
            },
        }
    }
}

/// Read and parse an env var, falling back to `default` when unset.
///
/// Panics if the variable is set but does not parse; misconfiguration should
/// fail fast at startup.
fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} is invalid ('{raw}'): {e}")),
        Err(_) => default,
    }
}
