use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_EXPLANATION: &str = "No explanation provided";
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

// Parsed completion reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlGeneration {
    pub sql: String,
    pub explanation: String,
    pub confidence: f64,
    pub suggestions: Vec<String>,
    /// The reply was not a JSON object; every field above is a default.
    pub parse_failed: bool,
}

impl SqlGeneration {
    /// Parses a completion reply. Never fails: anything that is not a JSON
    /// object degrades to the defaults with `parse_failed` set.
    pub fn from_reply(content: &str) -> Self {
        let (object, parse_failed) = match serde_json::from_str::<Value>(strip_code_fence(content)) {
            Ok(Value::Object(map)) => (map, false),
            _ => (Map::new(), true),
        };

        let sql = object
            .get("sql")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let explanation = object
            .get("explanation")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_EXPLANATION)
            .to_string();

        let suggestions = object
            .get("suggestions")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            sql,
            explanation,
            confidence: normalize_confidence(object.get("confidence")),
            suggestions,
            parse_failed,
        }
    }

    pub fn has_sql(&self) -> bool {
        !self.sql.is_empty()
    }
}

/// Missing, non-numeric and NaN values become 0.5; everything else is
/// clamped into `[0, 1]`.
fn normalize_confidence(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(c) if !c.is_nan() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
