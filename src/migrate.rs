use anyhow::Result;
use sqlx::SqliteConnection;

use crate::models::TextField;

/// Create the index schema on a fresh database.
pub async fn create_schema(conn: &mut SqliteConnection) -> Result<()> {
    // One row per application; (appname, pkgname) is the identity key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            docid INTEGER PRIMARY KEY,
            data TEXT NOT NULL,
            appname TEXT NOT NULL,
            pkgname TEXT NOT NULL,
            UNIQUE(appname, pkgname)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_values (
            docid INTEGER NOT NULL,
            slot INTEGER NOT NULL,
            text_value TEXT,
            num_value REAL,
            PRIMARY KEY (docid, slot),
            FOREIGN KEY (docid) REFERENCES documents(docid)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_terms (
            docid INTEGER NOT NULL,
            term TEXT NOT NULL,
            PRIMARY KEY (docid, term),
            FOREIGN KEY (docid) REFERENCES documents(docid)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS postings (
            docid INTEGER NOT NULL,
            term TEXT NOT NULL,
            wdf INTEGER NOT NULL,
            PRIMARY KEY (docid, term),
            FOREIGN KEY (docid) REFERENCES documents(docid)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spelling (
            word TEXT PRIMARY KEY,
            freq INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='documents_fts'",
    )
    .fetch_one(&mut *conn)
    .await?;

    if !fts_exists {
        sqlx::query(&create_fts_sql()).execute(&mut *conn).await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_doc_terms_term ON doc_terms(term)")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_pkgname ON documents(pkgname)")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_doc_values_slot ON doc_values(slot, num_value)")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// One FTS5 column per text field, in [`TextField::ALL`] order. The rowid is
/// the document's docid.
fn create_fts_sql() -> String {
    let columns: Vec<&str> = TextField::ALL.iter().map(|f| f.column()).collect();
    format!(
        "CREATE VIRTUAL TABLE documents_fts USING fts5({}, tokenize = 'unicode61')",
        columns.join(", ")
    )
}

/// `bm25()` weight arguments matching the FTS5 column order.
pub fn bm25_weights() -> String {
    TextField::ALL
        .iter()
        .map(|f| format!("{:.1}", f.weight() as f64))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fts_columns_follow_field_order() {
        let sql = create_fts_sql();
        assert!(sql.contains("fts5(name, pkgname, keywords, apt_summary"));
        assert_eq!(bm25_weights(), "10.0, 8.0, 5.0, 5.0, 3.0, 1.0, 1.0, 1.0");
    }
}
