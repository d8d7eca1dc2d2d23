//! In-memory [`IndexStore`] used by tests and `rebuild --dry-run`.

use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{document_key, AddOutcome, IndexStore};
use crate::models::IndexDocument;

#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    documents: Vec<IndexDocument>,
    keys: HashSet<(String, String)>,
    metadata: BTreeMap<String, String>,
    committed: bool,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &[IndexDocument] {
        &self.documents
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn find(&self, pkgname: &str) -> Option<&IndexDocument> {
        self.documents.iter().find(|d| d.pkgname() == Some(pkgname))
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn add_document(&mut self, doc: &IndexDocument) -> Result<AddOutcome> {
        if self.committed {
            bail!("store already committed");
        }
        if !self.keys.insert(document_key(doc)) {
            return Ok(AddOutcome::Duplicate);
        }
        self.documents.push(doc.clone());
        Ok(AddOutcome::Added)
    }

    async fn set_metadata(&mut self, key: &str, value: &str) -> Result<()> {
        self.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn supports_spelling(&self) -> bool {
        false
    }

    async fn add_spelling(&mut self, _word: &str) -> Result<()> {
        Ok(())
    }

    fn document_count(&self) -> u64 {
        self.documents.len() as u64
    }

    async fn commit(&mut self) -> Result<()> {
        self.committed = true;
        Ok(())
    }
}
