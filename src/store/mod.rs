//! Write side of the index.
//!
//! The [`IndexStore`] trait is everything the rebuild needs from the search
//! engine: submit documents, set batch metadata, feed the spelling
//! dictionary and commit once at the end. Nothing is visible to readers
//! before [`commit`](IndexStore::commit).
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`sqlite::SqliteIndexStore`] | on-disk index (documents, values, terms, FTS5) |
//! | [`memory::MemoryIndexStore`] | tests and dry runs |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::IndexDocument;

/// Result of submitting one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// An earlier document already holds this (application name, package)
    /// pair. The first one wins.
    Duplicate,
}

/// Single-writer index backend.
///
/// Methods take `&mut self`: one writable handle per index, held by the
/// rebuild for its whole duration.
#[async_trait]
pub trait IndexStore: Send {
    async fn add_document(&mut self, doc: &IndexDocument) -> Result<AddOutcome>;

    async fn set_metadata(&mut self, key: &str, value: &str) -> Result<()>;

    /// Whether [`add_spelling`](IndexStore::add_spelling) records anything.
    fn supports_spelling(&self) -> bool;

    async fn add_spelling(&mut self, word: &str) -> Result<()>;

    /// Documents accepted so far.
    fn document_count(&self) -> u64;

    /// Flush the batch. Called exactly once, after all documents.
    async fn commit(&mut self) -> Result<()>;
}

/// Identity key of a document.
pub fn document_key(doc: &IndexDocument) -> (String, String) {
    (doc.data.clone(), doc.pkgname().unwrap_or_default().to_string())
}
