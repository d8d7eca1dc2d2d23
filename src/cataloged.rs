//! First-seen timestamps per package.
//!
//! The table is written by a separate process. The index builder loads it
//! once at start and only reads it.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default)]
pub struct CatalogedTimes {
    times: HashMap<String, f64>,
}

impl CatalogedTimes {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a JSON object mapping package names to unix seconds.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cataloged times: {}", path.display()))?;
        let times: HashMap<String, f64> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cataloged times: {}", path.display()))?;
        Ok(Self { times })
    }

    pub fn get(&self, pkgname: &str) -> Option<f64> {
        self.times.get(pkgname).copied()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl FromIterator<(String, f64)> for CatalogedTimes {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            times: iter.into_iter().collect(),
        }
    }
}
