//! Document lookup by package name.
//!
//! Prints every document indexed for a package: its stored values by slot
//! and its boolean terms. One package can back several documents (several
//! desktop files, or a foreign-architecture variant).

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::ValueSlot;

#[derive(Debug, Clone, Serialize)]
pub struct ShownValue {
    pub slot: u32,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShownDocument {
    pub docid: i64,
    pub appname: String,
    pub pkgname: String,
    pub values: Vec<ShownValue>,
    pub terms: Vec<String>,
}

pub async fn show_package(pool: &SqlitePool, pkgname: &str) -> Result<Vec<ShownDocument>> {
    let doc_rows = sqlx::query(
        "SELECT docid, data, pkgname FROM documents WHERE pkgname = ? ORDER BY docid ASC",
    )
    .bind(pkgname)
    .fetch_all(pool)
    .await?;

    let mut docs = Vec::with_capacity(doc_rows.len());
    for row in &doc_rows {
        let docid: i64 = row.get("docid");

        let value_rows = sqlx::query(
            "SELECT slot, text_value, num_value FROM doc_values WHERE docid = ? ORDER BY slot ASC",
        )
        .bind(docid)
        .fetch_all(pool)
        .await?;
        let values = value_rows
            .iter()
            .map(|v| {
                let slot: i64 = v.get("slot");
                let text: Option<String> = v.get("text_value");
                let num: Option<f64> = v.get("num_value");
                let name = u32::try_from(slot)
                    .ok()
                    .and_then(ValueSlot::from_id)
                    .map(|s| s.name().to_string())
                    .unwrap_or_else(|| format!("slot{}", slot));
                ShownValue {
                    slot: slot as u32,
                    name,
                    value: text.or_else(|| num.map(|n| n.to_string())).unwrap_or_default(),
                }
            })
            .collect();

        let terms: Vec<String> =
            sqlx::query_scalar("SELECT term FROM doc_terms WHERE docid = ? ORDER BY term ASC")
                .bind(docid)
                .fetch_all(pool)
                .await?;

        docs.push(ShownDocument {
            docid,
            appname: row.get("data"),
            pkgname: row.get("pkgname"),
            values,
            terms,
        });
    }
    Ok(docs)
}

/// CLI entry point: print the package's documents, as text or JSON.
pub async fn run_show(config: &Config, pkgname: &str, json: bool) -> Result<()> {
    let pool = db::open_reader(&config.index.path).await?;
    let docs = show_package(&pool, pkgname).await?;
    pool.close().await;

    if docs.is_empty() {
        bail!("package not indexed: {}", pkgname);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    for doc in &docs {
        println!("--- {} ({}) ---", doc.appname, doc.pkgname);
        for value in &doc.values {
            println!("{:>4} {:<24} {}", value.slot, value.name, value.value);
        }
        println!("terms: {}", doc.terms.join(" "));
        println!();
    }
    Ok(())
}
