//! Read-side queries against a committed index.
//!
//! Free text is matched through the FTS5 table and ranked with `bm25()`
//! using the per-field weights the index was built with. Category, channel
//! and package filters are boolean term lookups. An empty query lists
//! documents by popularity. When free text matches nothing, a spelling
//! suggestion is offered from the index's own vocabulary.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate::bm25_weights;
use crate::models::ValueSlot;
use crate::terms::tokenize;

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    pub category: Option<String>,
    pub channel: Option<String>,
    pub pkgname: Option<String>,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub docid: i64,
    pub appname: String,
    pub pkgname: String,
    pub summary: Option<String>,
    pub popcon: Option<f64>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Corrected query, only when the original found nothing.
    pub suggestion: Option<String>,
}

impl SearchQuery {
    fn filter_terms(&self) -> Vec<String> {
        let mut terms = Vec::new();
        if let Some(category) = &self.category {
            terms.push(format!("AC{}", category.to_lowercase()));
        }
        if let Some(channel) = &self.channel {
            terms.push(format!("AH{}", channel));
        }
        if let Some(pkgname) = &self.pkgname {
            terms.push(format!("AP{}", pkgname));
        }
        terms
    }
}

/// FTS5 expression: every word quoted, implicitly AND-ed.
fn match_expression(words: &[String]) -> String {
    words
        .iter()
        .map(|w| format!("\"{}\"", w.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn search_index(pool: &SqlitePool, query: &SearchQuery) -> Result<SearchResults> {
    let words: Vec<String> = tokenize(&query.text).collect();
    let filters = query.filter_terms();
    let filter_sql: String = filters
        .iter()
        .map(|_| " AND EXISTS (SELECT 1 FROM doc_terms t WHERE t.docid = d.docid AND t.term = ?)")
        .collect();

    let rows = if words.is_empty() {
        let sql = format!(
            r#"
            SELECT d.docid, d.data, d.pkgname, COALESCE(p.num_value, 0.0) AS score
            FROM documents d
            LEFT JOIN doc_values p ON p.docid = d.docid AND p.slot = {popcon}
            WHERE 1 = 1{filters}
            ORDER BY score DESC, d.data ASC
            LIMIT ?
            "#,
            popcon = ValueSlot::Popcon.id(),
            filters = filter_sql
        );
        let mut q = sqlx::query(&sql);
        for term in &filters {
            q = q.bind(term);
        }
        q.bind(query.limit).fetch_all(pool).await?
    } else {
        let sql = format!(
            r#"
            SELECT d.docid, d.data, d.pkgname, -bm25(documents_fts, {weights}) AS score
            FROM documents_fts
            JOIN documents d ON d.docid = documents_fts.rowid
            WHERE documents_fts MATCH ?{filters}
            ORDER BY score DESC
            LIMIT ?
            "#,
            weights = bm25_weights(),
            filters = filter_sql
        );
        let mut q = sqlx::query(&sql).bind(match_expression(&words));
        for term in &filters {
            q = q.bind(term);
        }
        q.bind(query.limit).fetch_all(pool).await?
    };

    let mut hits = Vec::with_capacity(rows.len());
    for row in &rows {
        let docid: i64 = row.get("docid");
        hits.push(SearchHit {
            docid,
            appname: row.get("data"),
            pkgname: row.get("pkgname"),
            summary: text_value(pool, docid, ValueSlot::Summary).await?,
            popcon: number_value(pool, docid, ValueSlot::Popcon).await?,
            score: row.get("score"),
        });
    }

    let suggestion = if hits.is_empty() && !words.is_empty() {
        suggest_spelling(pool, &words).await?
    } else {
        None
    };

    Ok(SearchResults { hits, suggestion })
}

async fn text_value(pool: &SqlitePool, docid: i64, slot: ValueSlot) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT text_value FROM doc_values WHERE docid = ? AND slot = ?")
            .bind(docid)
            .bind(slot.id() as i64)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

async fn number_value(pool: &SqlitePool, docid: i64, slot: ValueSlot) -> Result<Option<f64>> {
    let value: Option<Option<f64>> =
        sqlx::query_scalar("SELECT num_value FROM doc_values WHERE docid = ? AND slot = ?")
            .bind(docid)
            .bind(slot.id() as i64)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

/// Replace unknown words with the most frequent dictionary word within a
/// small edit distance. `None` when nothing changes.
pub async fn suggest_spelling(pool: &SqlitePool, words: &[String]) -> Result<Option<String>> {
    let mut corrected = Vec::with_capacity(words.len());
    let mut changed = false;

    for word in words {
        let len = word.chars().count() as i64;
        let known: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM spelling WHERE word = ?")
            .bind(word)
            .fetch_one(pool)
            .await?;
        if known {
            corrected.push(word.clone());
            continue;
        }

        let max_distance: usize = if len < 5 { 1 } else { 2 };
        let rows = sqlx::query(
            "SELECT word, freq FROM spelling WHERE length(word) BETWEEN ? AND ?",
        )
        .bind(len - max_distance as i64)
        .bind(len + max_distance as i64)
        .fetch_all(pool)
        .await?;

        let best = rows
            .iter()
            .map(|r| (r.get::<String, _>("word"), r.get::<i64, _>("freq")))
            .filter_map(|(w, freq)| {
                let d = levenshtein(word, &w);
                (d <= max_distance).then_some((d, -freq, w))
            })
            .min();

        match best {
            Some((_, _, w)) => {
                corrected.push(w);
                changed = true;
            }
            None => corrected.push(word.clone()),
        }
    }

    Ok(changed.then(|| corrected.join(" ")))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        prev = cur;
    }
    prev[b.len()]
}

pub async fn run_search(config: &Config, query: &SearchQuery) -> Result<()> {
    let pool = db::open_reader(&config.index.path).await?;
    let results = search_index(&pool, query).await?;
    pool.close().await;

    if results.hits.is_empty() {
        println!("No results.");
        if let Some(suggestion) = results.suggestion {
            println!("Did you mean: {}", suggestion);
        }
        return Ok(());
    }

    for (i, hit) in results.hits.iter().enumerate() {
        println!("{}. [{:.2}] {} ({})", i + 1, hit.score, hit.appname, hit.pkgname);
        if let Some(summary) = &hit.summary {
            println!("    {}", summary);
        }
        if let Some(popcon) = hit.popcon {
            println!("    popcon: {}", popcon);
        }
    }
    Ok(())
}
