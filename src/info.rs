//! Index statistics and batch metadata.
//!
//! Used by `sc-index info` to show which rebuild is live: its generation,
//! build time and content hash, plus document counts per channel.

use std::collections::BTreeMap;

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

pub async fn read_metadata(pool: &SqlitePool) -> Result<BTreeMap<String, String>> {
    let rows = sqlx::query("SELECT key, value FROM metadata")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|r| (r.get::<String, _>("key"), r.get::<String, _>("value")))
        .collect())
}

pub async fn run_info(config: &Config) -> Result<()> {
    let pool = db::open_reader(&config.index.path).await?;

    let metadata = read_metadata(&pool).await?;
    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;
    let total_terms: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT term) FROM postings")
        .fetch_one(&pool)
        .await?;
    let spelling_words: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM spelling")
        .fetch_one(&pool)
        .await?;

    let file = db::index_file(&config.index.path);
    let db_size = std::fs::metadata(&file).map(|m| m.len()).unwrap_or(0);

    println!("Software Center Index");
    println!("=====================");
    println!();
    println!("  Index:       {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Terms:       {}", total_terms);
    println!("  Spellings:   {}", spelling_words);

    if !metadata.is_empty() {
        println!();
        println!("  Metadata:");
        for (key, value) in &metadata {
            println!("  {:<24} {}", key, value);
        }
    }

    // Channels are stored as AH<channel> terms.
    let channel_rows = sqlx::query(
        r#"
        SELECT substr(term, 3) AS channel, COUNT(*) AS doc_count
        FROM doc_terms
        WHERE term LIKE 'AH%'
        GROUP BY term
        ORDER BY doc_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !channel_rows.is_empty() {
        println!();
        println!("  By channel:");
        println!("  {:<32} {:>6}", "CHANNEL", "DOCS");
        println!("  {}", "-".repeat(40));
        for row in &channel_rows {
            let channel: String = row.get("channel");
            let count: i64 = row.get("doc_count");
            println!("  {:<32} {:>6}", channel, count);
        }
    }

    println!();
    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
