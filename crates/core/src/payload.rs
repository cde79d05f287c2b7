//! Device payload coercion.
//!
//! A device publishes a single flat JSON object mapping pin identifiers to
//! numeric literals, e.g. `{"V1": 21.5, "V2": "1013.2"}`. [`parse_pin_payload`]
//! turns that into an ordered list of `(pin, value)` pairs.
//!
//! Shape errors reject the whole message. Value errors reject only the pin
//! they occur on; the caller receives them alongside the accepted pins so it
//! can log each one.

use serde_json::Value;

/// The payload as a whole could not be accepted.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Not valid JSON at all.
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Valid JSON but not an object (array, scalar, null).
    #[error("Payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// An object whose value for `pin` is itself an object or array.
    #[error("Payload must be flat, pin '{pin}' holds a nested {kind}")]
    Nested { pin: String, kind: &'static str },
}

/// A single pin value that failed numeric coercion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Pin '{pin}' has non-numeric value {raw}")]
pub struct PinValueError {
    /// Pin identifier the value was published under.
    pub pin: String,
    /// The offending JSON value, re-serialized for logging.
    pub raw: String,
}

/// Result of parsing one device payload.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PinPayload {
    /// Accepted samples in payload (insertion) order.
    pub values: Vec<(String, f64)>,
    /// Pins dropped because their value could not be coerced.
    pub rejected: Vec<PinValueError>,
}

impl PinPayload {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse a raw device payload.
///
/// Numbers are taken as-is. Strings are trimmed and parsed as decimal floats.
/// Empty strings, non-numeric strings, booleans, `null` and values that parse
/// to a non-finite float are reported in [`PinPayload::rejected`].
pub fn parse_pin_payload(bytes: &[u8]) -> Result<PinPayload, PayloadError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let object = match value {
        Value::Object(map) => map,
        other => return Err(PayloadError::NotAnObject(json_kind(&other))),
    };

    // Shape check first so a nested value anywhere rejects the whole message.
    for (pin, value) in &object {
        if value.is_object() || value.is_array() {
            return Err(PayloadError::Nested {
                pin: pin.clone(),
                kind: json_kind(value),
            });
        }
    }

    let mut payload = PinPayload::default();
    for (pin, value) in object {
        match coerce_number(&value) {
            Some(number) => payload.values.push((pin, number)),
            None => payload.rejected.push(PinValueError {
                pin,
                raw: value.to_string(),
            }),
        }
    }
    Ok(payload)
}

/// Coerce a scalar JSON value to a finite `f64`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
