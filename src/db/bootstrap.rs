use duckdb::{params, Connection};
use tracing::{debug, info};

use crate::catalog::{schema::sequence_name, TABLES};
use crate::db::db_pool::DbPool;
use crate::db::with_connection;
use crate::error::PipelineError;

/// Creates every catalog table (and its id sequence) that does not exist yet.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), PipelineError> {
    with_connection(pool, |conn| {
        create_tables(conn)?;
        Ok(())
    })
    .await
}

fn create_tables(conn: &Connection) -> Result<(), PipelineError> {
    for table in TABLES {
        if table.has_serial_id() {
            conn.execute_batch(&format!(
                "CREATE SEQUENCE IF NOT EXISTS {};",
                sequence_name(table.name)
            ))?;
        }
        conn.execute_batch(&table.to_create_table_sql())?;
        debug!("Ensured table {}", table.name);
    }
    info!("Database schema ready ({} tables)", TABLES.len());
    Ok(())
}

/// Fills the analytics tables with a small demo data set. Does nothing when
/// scraped data is already present.
pub async fn seed_demo_data(pool: &DbPool) -> Result<usize, PipelineError> {
    with_connection(pool, |conn| {
        let existing: i64 = conn.query_row("SELECT COUNT(*) FROM scraped_data", [], |row| row.get(0))?;
        if existing > 0 {
            info!("Skipping demo data, scraped_data already has {} rows", existing);
            return Ok(0);
        }
        let inserted = insert_demo_rows(conn)?;
        info!("Inserted {} demo rows", inserted);
        Ok(inserted)
    })
    .await
}

const DEMO_SCRAPERS: &[(&str, &str, &str, &str)] = &[
    ("News headlines", "https://news.example.com", r#"["h1", ".headline"]"#, "hourly"),
    ("Shop prices", "https://shop.example.com", r#"[".price", ".title"]"#, "daily"),
];

const DEMO_PAGES: &[(&str, &str, &str, &str, i64)] = &[
    ("https://news.example.com/a", "news.example.com", "Markets rally", r#"{"headline": "Markets rally", "words": 420}"#, 1),
    ("https://news.example.com/b", "news.example.com", "Rates hold", r#"{"headline": "Rates hold", "words": 310}"#, 1),
    ("https://news.example.com/c", "news.example.com", "Tech earnings", r#"{"headline": "Tech earnings", "words": 655}"#, 1),
    ("https://news.example.com/d", "news.example.com", "Weather alert", r#"{"headline": "Weather alert", "words": 120}"#, 1),
    ("https://shop.example.com/p/1", "shop.example.com", "Desk lamp", r#"{"price": 39.9, "currency": "USD"}"#, 2),
    ("https://shop.example.com/p/2", "shop.example.com", "Office chair", r#"{"price": 189.0, "currency": "USD"}"#, 2),
    ("https://blog.example.org/post", "blog.example.org", "Release notes", r#"{"tags": ["release", "changelog"]}"#, 0),
];

const DEMO_POSTS: &[(&str, &str, &str, &str, &str, &str)] = &[
    ("twitter", "Loving the new dashboard!", "@ana", r#"{"likes": 120, "shares": 14}"#, "positive", r#"["dashboard"]"#),
    ("twitter", "Export keeps timing out", "@ben", r#"{"likes": 8, "shares": 1}"#, "negative", r#"["export", "timeout"]"#),
    ("linkedin", "We cut reporting time in half", "Cara D.", r#"{"likes": 310, "shares": 42}"#, "positive", r#"["reporting"]"#),
    ("facebook", "Scheduled a demo for next week", "Dev Ops", r#"{"likes": 15, "shares": 0}"#, "neutral", r#"["demo"]"#),
];

fn insert_demo_rows(conn: &Connection) -> Result<usize, PipelineError> {
    let now = chrono::Utc::now().timestamp_millis();
    let mut inserted = 0;

    let mut scraper_ids = Vec::with_capacity(DEMO_SCRAPERS.len());
    for (name, url, selectors, frequency) in DEMO_SCRAPERS {
        let id: i64 = conn.query_row(
            "INSERT INTO scrapers (name, url, selectors, frequency, max_pages, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, 10, true, epoch_ms(CAST(? AS BIGINT)), epoch_ms(CAST(? AS BIGINT)))
             RETURNING id",
            params![name, url, selectors, frequency, now, now],
            |row| row.get(0),
        )?;
        scraper_ids.push(id);
        inserted += 1;
    }

    for (offset, (url, domain, title, content, scraper)) in DEMO_PAGES.iter().enumerate() {
        // 1-based index into the demo scrapers, 0 for pages collected by hand.
        let scraper_id = usize::try_from(*scraper - 1)
            .ok()
            .and_then(|i| scraper_ids.get(i).copied());
        let scraped_at = now - (offset as i64) * 3_600_000;
        conn.execute(
            "INSERT INTO scraped_data (url, domain, title, content, scraped_at, scraper_id)
             VALUES (?, ?, ?, ?, epoch_ms(CAST(? AS BIGINT)), ?)",
            params![url, domain, title, content, scraped_at, scraper_id],
        )?;
        inserted += 1;
    }

    for (platform, content, author, metrics, sentiment, keywords) in DEMO_POSTS {
        conn.execute(
            "INSERT INTO social_media_data (platform, content, author, metrics, sentiment, keywords, collected_at)
             VALUES (?, ?, ?, ?, ?, ?, epoch_ms(CAST(? AS BIGINT)))",
            params![platform, content, author, metrics, sentiment, keywords, now],
        )?;
        inserted += 1;
    }

    Ok(inserted)
}
