//! Inbound reading validation.
//!
//! The validator is the only place that looks at the loosely-typed JSON a
//! sensor submits. Everything downstream works with [`NewReading`].
//!
//! All checks run; failures are collected in order rather than stopping at
//! the first one, so a client can fix every problem in one round trip.
//! Messages follow the `"<field>" <problem>` convention dashboard clients
//! already display.

use serde_json::{Map, Value};
use sensorhub_types::{NewReading, Parameter};

use crate::time::parse_instant;

/// A candidate reading failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {}", messages.join("; "))]
pub struct ValidationError {
    /// Field-level messages, in check order.
    pub messages: Vec<String>,
}

impl ValidationError {
    /// The field-level messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Validate a decoded request body and build the typed reading.
///
/// # Errors
///
/// Returns [`ValidationError`] listing every failed check.
pub fn validate(candidate: &Value) -> Result<NewReading, ValidationError> {
    let Some(body) = candidate.as_object() else {
        return Err(ValidationError {
            messages: vec![String::from("\"value\" must be of type object")],
        });
    };

    let mut messages = Vec::new();

    let sensor_id = required_string(body, "sensor_id", "sensor_id", &mut messages);
    let params = check_params(body, &mut messages);
    let timestamp = match body.get("timestamp") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => {
            let parsed = parse_instant(raw);
            if parsed.is_none() {
                messages.push(String::from("\"timestamp\" must be a valid ISO-8601 date"));
            }
            parsed
        }
        Some(_) => {
            messages.push(String::from("\"timestamp\" must be a valid ISO-8601 date"));
            None
        }
    };

    match (sensor_id, params) {
        (Some(sensor_id), Some(params)) if messages.is_empty() => Ok(NewReading {
            sensor_id,
            params,
            timestamp,
        }),
        _ => Err(ValidationError { messages }),
    }
}

fn check_params(body: &Map<String, Value>, messages: &mut Vec<String>) -> Option<Vec<Parameter>> {
    let items = match body.get("params") {
        None => {
            messages.push(String::from("\"params\" is required"));
            return None;
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            messages.push(String::from("\"params\" should be an array"));
            return None;
        }
    };

    if items.is_empty() {
        messages.push(String::from("\"params\" must contain at least 1 item"));
        return None;
    }

    let before = messages.len();
    let mut params = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let path = format!("params[{index}]");
        let Some(fields) = item.as_object() else {
            messages.push(format!("\"{path}\" must be of type object"));
            continue;
        };

        let name = required_string(fields, "name", &format!("{path}.name"), messages);
        let value = required_finite(fields, &format!("{path}.value"), messages);
        let units = required_string(fields, "units", &format!("{path}.units"), messages);

        if let (Some(name), Some(value), Some(units)) = (name, value, units) {
            params.push(Parameter { name, value, units });
        }
    }

    (messages.len() == before).then_some(params)
}

/// A present, non-empty string field.
fn required_string(
    fields: &Map<String, Value>,
    key: &str,
    label: &str,
    messages: &mut Vec<String>,
) -> Option<String> {
    match fields.get(key) {
        None => {
            messages.push(format!("\"{label}\" is required"));
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            messages.push(format!("\"{label}\" cannot be empty"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            messages.push(format!("\"{label}\" should be a string"));
            None
        }
    }
}

/// A present numeric `value` field holding a finite number.
fn required_finite(
    fields: &Map<String, Value>,
    label: &str,
    messages: &mut Vec<String>,
) -> Option<f64> {
    match fields.get("value") {
        None => {
            messages.push(format!("\"{label}\" is required"));
            None
        }
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => Some(v),
            _ => {
                messages.push(format!("\"{label}\" must be a finite number"));
                None
            }
        },
        Some(_) => {
            messages.push(format!("\"{label}\" should be a number"));
            None
        }
    }
}
