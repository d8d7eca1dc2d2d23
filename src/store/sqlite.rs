//! SQLite-backed [`IndexStore`].
//!
//! The whole batch runs inside one transaction opened at creation and
//! committed by [`IndexStore::commit`]; an interrupted rebuild leaves only
//! a rolled-back journal behind.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, SqliteConnection};

use super::{document_key, AddOutcome, IndexStore};
use crate::db;
use crate::migrate;
use crate::models::{IndexDocument, IndexValue, TextField};

pub struct SqliteIndexStore {
    conn: Option<SqliteConnection>,
    path: PathBuf,
    count: u64,
}

impl SqliteIndexStore {
    /// Create a new index in `index_dir` and open the batch transaction.
    pub async fn create(index_dir: &Path) -> Result<Self> {
        let mut conn = db::open_writer(index_dir).await?;
        migrate::create_schema(&mut conn).await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut conn).await?;
        Ok(Self {
            conn: Some(conn),
            path: index_dir.to_path_buf(),
            count: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| anyhow!("index {} already committed", self.path.display()))
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn add_document(&mut self, doc: &IndexDocument) -> Result<AddOutcome> {
        let (appname, pkgname) = document_key(doc);
        let conn = self.conn()?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO documents (data, appname, pkgname) VALUES (?, ?, ?)",
        )
        .bind(&doc.data)
        .bind(&appname)
        .bind(&pkgname)
        .execute(&mut *conn)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(AddOutcome::Duplicate);
        }
        let docid = result.last_insert_rowid();

        for (slot, value) in &doc.values {
            let (text, num) = match value {
                IndexValue::Text(s) => (Some(s.as_str()), None),
                IndexValue::Number(n) => (None, Some(*n)),
            };
            sqlx::query(
                "INSERT INTO doc_values (docid, slot, text_value, num_value) VALUES (?, ?, ?, ?)",
            )
            .bind(docid)
            .bind(slot.id() as i64)
            .bind(text)
            .bind(num)
            .execute(&mut *conn)
            .await?;
        }

        for term in &doc.terms {
            sqlx::query("INSERT OR IGNORE INTO doc_terms (docid, term) VALUES (?, ?)")
                .bind(docid)
                .bind(term)
                .execute(&mut *conn)
                .await?;
        }

        for (term, wdf) in &doc.postings {
            sqlx::query("INSERT INTO postings (docid, term, wdf) VALUES (?, ?, ?)")
                .bind(docid)
                .bind(term)
                .bind(*wdf as i64)
                .execute(&mut *conn)
                .await?;
        }

        let columns: Vec<&str> = TextField::ALL.iter().map(|f| f.column()).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO documents_fts (rowid, {}) VALUES (?, {})",
            columns.join(", "),
            placeholders
        );
        let mut insert = sqlx::query(&sql).bind(docid);
        for field in TextField::ALL {
            insert = insert.bind(doc.text.get(&field).map(String::as_str).unwrap_or(""));
        }
        insert.execute(&mut *conn).await?;

        self.count += 1;
        Ok(AddOutcome::Added)
    }

    async fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        sqlx::query(
            "INSERT INTO metadata (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    fn supports_spelling(&self) -> bool {
        true
    }

    async fn add_spelling(&mut self, word: &str) -> Result<()> {
        let conn = self.conn()?;
        sqlx::query(
            "INSERT INTO spelling (word, freq) VALUES (?, 1)
             ON CONFLICT(word) DO UPDATE SET freq = freq + 1",
        )
        .bind(word)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    fn document_count(&self) -> u64 {
        self.count
    }

    async fn commit(&mut self) -> Result<()> {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| anyhow!("index {} already committed", self.path.display()))?;
        sqlx::query("COMMIT")
            .execute(&mut conn)
            .await
            .with_context(|| format!("Failed to commit index: {}", self.path.display()))?;
        sqlx::query("INSERT INTO documents_fts(documents_fts) VALUES ('optimize')")
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValueSlot;
    use sqlx::Row;
    use tempfile::TempDir;

    fn gimp() -> IndexDocument {
        let mut doc = IndexDocument::new("GIMP");
        doc.add_value(ValueSlot::PkgName, "gimp");
        doc.add_number(ValueSlot::Popcon, 4.0);
        doc.add_term("APgimp");
        crate::terms::TermGenerator::new(&mut doc).index_text(TextField::Name, "GIMP");
        doc
    }

    #[tokio::test]
    async fn documents_are_visible_after_commit() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("idx");
        let mut store = SqliteIndexStore::create(&dir).await.unwrap();
        assert_eq!(store.add_document(&gimp()).await.unwrap(), AddOutcome::Added);
        assert_eq!(store.add_document(&gimp()).await.unwrap(), AddOutcome::Duplicate);
        store.set_metadata("db-schema-version", "1").await.unwrap();
        store.add_spelling("gimp").await.unwrap();
        store.commit().await.unwrap();
        assert_eq!(store.document_count(), 1);
        assert!(store.commit().await.is_err());

        let pool = db::open_reader(&dir).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        let row = sqlx::query("SELECT num_value FROM doc_values WHERE slot = ?")
            .bind(ValueSlot::Popcon.id() as i64)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<f64, _>("num_value"), 4.0);
        let hits: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents_fts WHERE documents_fts MATCH 'gimp'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(hits, 1);
    }
}
