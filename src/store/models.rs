use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::results::RowMapping;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRecord {
    pub id: i64,
    pub name: Option<String>,
    pub natural_language_query: Option<String>,
    pub sql_query: String,
    /// `None` until the query has run successfully once.
    pub results: Option<Vec<RowMapping>>,
    pub is_saved: bool,
    pub executed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewQuery {
    pub name: Option<String>,
    pub natural_language_query: Option<String>,
    pub sql_query: String,
    pub results: Option<Vec<RowMapping>>,
    pub is_saved: bool,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct QueryUpdate {
    pub name: Option<String>,
    pub results: Option<Vec<RowMapping>>,
    pub is_saved: Option<bool>,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct QueryFilter {
    pub saved: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Success,
    Error,
    Warning,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Success => "success",
            ActivityStatus::Error => "error",
            ActivityStatus::Warning => "warning",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ActivityStatus::Success),
            "error" => Some(ActivityStatus::Error),
            "warning" => Some(ActivityStatus::Warning),
            _ => None,
        }
    }
}

/// Structured context attached to an activity.
///
/// Variants are tried in declaration order when reading stored rows, so the
/// ones with more distinctive fields come first; anything unrecognised is
/// kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityMetadata {
    #[serde(rename_all = "camelCase")]
    QueryFailed {
        query_id: Option<i64>,
        kind: String,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    QueryExecuted { query_id: i64, result_count: usize },
    #[serde(rename_all = "camelCase")]
    QueryGenerated { query_id: i64, confidence: f64 },
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub status: ActivityStatus,
    pub metadata: Option<ActivityMetadata>,
    pub created_at: DateTime<Utc>,
}
