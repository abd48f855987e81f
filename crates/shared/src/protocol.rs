use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ControlRods, CoolantState, Output, ReactorState, ReactorSummary, Temperature};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactorListResponse {
    pub plant_name: String,
    pub reactors: Vec<ReactorSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureResponse {
    pub temperature: Temperature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactorStateResponse {
    pub state: ReactorState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RodStateResponse {
    pub control_rods: ControlRods,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolantResponse {
    pub coolant: CoolantState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputResponse {
    pub output: Output,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FuelLevel {
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FuelLevelResponse {
    pub fuel: FuelLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoolantRequest {
    pub coolant: CoolantState,
}

/// Flattens the `/reactors/logs` payload into display lines.
///
/// The service returns an array of loosely shaped objects (typically keyed by
/// reactor id with a list of messages). Strings are taken as-is, arrays are
/// walked recursively, object values are visited in key order, and any other
/// scalar is rendered as JSON text.
pub fn flatten_log_entries(entries: &[Value]) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in entries {
        collect_log_lines(entry, &mut lines);
    }
    lines
}

fn collect_log_lines(value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(text) => lines.push(text.clone()),
        Value::Array(items) => {
            for item in items {
                collect_log_lines(item, lines);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_log_lines(item, lines);
            }
        }
        other => lines.push(other.to_string()),
    }
}
