//! Curated description of the queryable tables.
//!
//! The catalog is static on purpose: the model sees a stable, documented view
//! of the data instead of whatever the physical database happens to contain.
//! Bootstrap creates the physical tables from the same definitions.

pub mod schema;

use self::schema::{ColumnSchema, TableSchema};
use self::schema::DataType::*;

pub const TABLES: &[TableSchema] = &[
    TableSchema {
        name: "scrapers",
        description: "Web scraper configurations",
        columns: &[
            ColumnSchema::required("id", Serial),
            ColumnSchema::required("name", Text),
            ColumnSchema::required("url", Text),
            ColumnSchema::required("selectors", Json),
            ColumnSchema::required("frequency", Text),
            ColumnSchema::optional("max_pages", Integer),
            ColumnSchema::required("is_active", Boolean),
            ColumnSchema::required("created_at", Timestamp),
            ColumnSchema::required("updated_at", Timestamp),
        ],
    },
    TableSchema {
        name: "scraped_data",
        description: "Pages collected by the web scrapers",
        columns: &[
            ColumnSchema::required("id", Serial),
            ColumnSchema::required("url", Text),
            ColumnSchema::required("domain", Text),
            ColumnSchema::optional("title", Text),
            ColumnSchema::required("content", Json),
            ColumnSchema::optional("selectors", Json),
            ColumnSchema::required("scraped_at", Timestamp),
            ColumnSchema::optional("scraper_id", BigInt),
        ],
    },
    TableSchema {
        name: "social_media_data",
        description: "Social media posts with engagement metrics and sentiment",
        columns: &[
            ColumnSchema::required("id", Serial),
            ColumnSchema::required("platform", Text),
            ColumnSchema::required("content", Text),
            ColumnSchema::optional("author", Text),
            ColumnSchema::optional("metrics", Json),
            ColumnSchema::optional("sentiment", Text),
            ColumnSchema::optional("keywords", Json),
            ColumnSchema::required("collected_at", Timestamp),
        ],
    },
    TableSchema {
        name: "queries",
        description: "Generated and saved SQL queries with cached results",
        columns: &[
            ColumnSchema::required("id", Serial),
            ColumnSchema::optional("name", Text),
            ColumnSchema::optional("natural_language_query", Text),
            ColumnSchema::required("sql_query", Text),
            ColumnSchema::optional("results", Json),
            ColumnSchema::required("is_saved", Boolean),
            ColumnSchema::optional("executed_at", Timestamp),
            ColumnSchema::required("created_at", Timestamp),
        ],
    },
    TableSchema {
        name: "exports",
        description: "Data export jobs",
        columns: &[
            ColumnSchema::required("id", Serial),
            ColumnSchema::required("name", Text),
            ColumnSchema::required("type", Text),
            ColumnSchema::optional("query_id", BigInt),
            ColumnSchema::optional("file_path", Text),
            ColumnSchema::required("status", Text),
            ColumnSchema::required("created_at", Timestamp),
            ColumnSchema::optional("completed_at", Timestamp),
        ],
    },
    TableSchema {
        name: "activities",
        description: "System activity log",
        columns: &[
            ColumnSchema::required("id", Serial),
            ColumnSchema::required("type", Text),
            ColumnSchema::required("message", Text),
            ColumnSchema::required("status", Text),
            ColumnSchema::optional("metadata", Json),
            ColumnSchema::required("created_at", Timestamp),
        ],
    },
];

/// Text block handed to the language model. Deterministic and side-effect free.
pub fn describe_schema() -> String {
    let mut description = String::from("Database Schema:\n\n");
    for table in TABLES {
        description.push_str(&table.describe());
        description.push('\n');
    }
    description
}

const SUGGESTIONS: &[(&str, &[&str])] = &[
    (
        "performance",
        &[
            "Which scrapers have the highest failure rate?",
            "How many queries failed in the past week?",
            "Which scrapers collected the fewest pages?",
        ],
    ),
    (
        "data",
        &[
            "What are the top 10 domains we scraped?",
            "Show recent scraped data",
            "How many records do we have per domain?",
        ],
    ),
    (
        "sentiment",
        &[
            "Analyze sentiment distribution across all platforms",
            "Show me the most positive posts from this week",
            "Compare sentiment between Twitter and LinkedIn",
        ],
    ),
    (
        "trends",
        &[
            "Show data collection trends over the past month",
            "What are the most active scraping times?",
            "Track query execution frequency",
        ],
    ),
];

const DEFAULT_SUGGESTIONS: &[&str] = &[
    "Show me recent activity",
    "What are the top domains?",
    "Analyze sentiment distribution",
];

/// Example questions for a free-form intent such as "sentiment trends".
pub fn suggest_questions(intent: &str) -> Vec<String> {
    let intent = intent.to_lowercase();
    SUGGESTIONS
        .iter()
        .find(|(key, _)| intent.contains(*key))
        .map(|(_, questions)| *questions)
        .unwrap_or(DEFAULT_SUGGESTIONS)
        .iter()
        .map(|q| q.to_string())
        .collect()
}
