//! Request Validation Module
//! =========================
//!
//! Turns raw JSON request bodies into validated [`InitializeRequest`] /
//! [`StepRequest`] values.
//!
//! Two layers of checking apply:
//! - **Type coercion**: numeric fields accept JSON numbers or numeric strings;
//!   integer fields reject fractional values. Missing fields take defaults.
//! - **Policy bounds**: deployment guardrails (e.g. at most 5000 nodes) that
//!   keep a public endpoint away from pathological inputs. They are not core
//!   invariants; [`ParameterBounds::unrestricted`] keeps only the core domain.
//!
//! Validation never touches session state, so a rejected request leaves the
//! simulation exactly as it was.

use crate::error::ServiceError;
use crate::types::{InitializeRequest, StepRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;

// =============================================================================
// POLICY BOUNDS
// =============================================================================

/// Accepted range for every request parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub num_nodes: RangeInclusive<usize>,
    pub initial_infected: RangeInclusive<usize>,
    pub edge_probability: RangeInclusive<f64>,
    pub infection_rate: RangeInclusive<f64>,
    pub recovery_rate: RangeInclusive<f64>,
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self {
            num_nodes: 100..=5000,
            initial_infected: 1..=50,
            edge_probability: 0.001..=0.01,
            infection_rate: 0.1..=1.0,
            recovery_rate: 0.1..=1.0,
        }
    }
}

impl ParameterBounds {
    /// Only the core's own domain: at least one node and one infected,
    /// probabilities in `[0, 1]`.
    pub fn unrestricted() -> Self {
        Self {
            num_nodes: 1..=usize::MAX,
            initial_infected: 1..=usize::MAX,
            edge_probability: 0.0..=1.0,
            infection_rate: 0.0..=1.0,
            recovery_rate: 0.0..=1.0,
        }
    }

    /// Checks an initialize request against these bounds.
    pub fn check_initialize(&self, request: &InitializeRequest) -> Result<(), ServiceError> {
        if !self.num_nodes.contains(&request.num_nodes) {
            return Err(out_of_range("Number of nodes", &self.num_nodes));
        }
        if !self.initial_infected.contains(&request.initial_infected) {
            return Err(out_of_range("Initial infected nodes", &self.initial_infected));
        }
        if request.initial_infected > request.num_nodes {
            return Err(ServiceError::validation(format!(
                "Initial infected nodes ({}) cannot exceed the number of nodes ({})",
                request.initial_infected, request.num_nodes
            )));
        }
        if !self.edge_probability.contains(&request.edge_probability) {
            return Err(out_of_range("Edge probability", &self.edge_probability));
        }
        Ok(())
    }

    /// Checks a step request against these bounds.
    pub fn check_step(&self, request: &StepRequest) -> Result<(), ServiceError> {
        if !self.infection_rate.contains(&request.infection_rate) {
            return Err(out_of_range("Infection rate", &self.infection_rate));
        }
        if !self.recovery_rate.contains(&request.recovery_rate) {
            return Err(out_of_range("Recovery rate", &self.recovery_rate));
        }
        Ok(())
    }

    /// Parses and checks an initialize body.
    pub fn parse_initialize(&self, body: &Value) -> Result<InitializeRequest, ServiceError> {
        let fields = as_object(body)?;
        let defaults = InitializeRequest::default();
        let request = InitializeRequest {
            num_nodes: integer_field(fields, "num_nodes", defaults.num_nodes)?,
            initial_infected: integer_field(fields, "initial_infected", defaults.initial_infected)?,
            edge_probability: real_field(fields, "edge_probability", defaults.edge_probability)?,
        };
        self.check_initialize(&request)?;
        Ok(request)
    }

    /// Parses and checks a step body.
    pub fn parse_step(&self, body: &Value) -> Result<StepRequest, ServiceError> {
        let fields = as_object(body)?;
        let defaults = StepRequest::default();
        let request = StepRequest {
            infection_rate: real_field(fields, "infection_rate", defaults.infection_rate)?,
            recovery_rate: real_field(fields, "recovery_rate", defaults.recovery_rate)?,
        };
        self.check_step(&request)?;
        Ok(request)
    }
}

fn out_of_range<T: std::fmt::Display>(label: &str, range: &RangeInclusive<T>) -> ServiceError {
    ServiceError::validation(format!(
        "{} must be between {} and {}",
        label,
        range.start(),
        range.end()
    ))
}

// =============================================================================
// FIELD COERCION
// =============================================================================

/// Parses a request body. An empty body means "all defaults".
pub fn parse_body(bytes: &[u8]) -> Result<Value, ServiceError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ServiceError::validation(format!("Malformed JSON body: {e}")))
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, ServiceError> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    match body {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(EMPTY.get_or_init(Map::new)),
        _ => Err(ServiceError::validation("Request body must be a JSON object")),
    }
}

fn integer_field(
    fields: &Map<String, Value>,
    name: &str,
    default: usize,
) -> Result<usize, ServiceError> {
    let not_integer =
        || ServiceError::validation(format!("{name} must be a non-negative integer"));
    let value = match fields.get(name) {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .or_else(|| n.as_f64().and_then(integral)),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<usize>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Some(_) => None,
    };
    value.ok_or_else(not_integer)
}

/// Whole, non-negative floats such as `300.0` count as integers.
fn integral(f: f64) -> Option<usize> {
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 {
        Some(f as usize)
    } else {
        None
    }
}

fn real_field(fields: &Map<String, Value>, name: &str, default: f64) -> Result<f64, ServiceError> {
    let not_number = || ServiceError::validation(format!("{name} must be a number"));
    let value = match fields.get(name) {
        None | Some(Value::Null) => return Ok(default),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(not_number)?,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| not_number())?,
        Some(_) => return Err(not_number()),
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(not_number())
    }
}
