use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::ConnectOptions;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::rebuild;

/// Database file inside an index directory.
pub const INDEX_FILE: &str = "index.sqlite";

pub fn index_file(index_dir: &Path) -> PathBuf {
    index_dir.join(INDEX_FILE)
}

/// Open the single writable handle on a fresh index directory.
///
/// The rollback journal lives next to the database and is gone after
/// commit, so the directory can be renamed as a unit.
pub async fn open_writer(index_dir: &Path) -> Result<SqliteConnection> {
    std::fs::create_dir_all(index_dir)
        .with_context(|| format!("Failed to create index directory: {}", index_dir.display()))?;

    let options = SqliteConnectOptions::new()
        .filename(index_file(index_dir))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let conn = options
        .connect()
        .await
        .with_context(|| format!("Failed to open index for writing: {}", index_dir.display()))?;
    Ok(conn)
}

/// Open a read-only pool on a live index.
///
/// A previous index stranded at `<path>_old` by an interrupted swap is moved
/// back first, or read in place when that is not permitted.
pub async fn open_reader(index_dir: &Path) -> Result<SqlitePool> {
    let mut file = index_file(index_dir);
    if !file.exists() {
        match rebuild::restore_interrupted_swap(index_dir) {
            Ok(true) => {}
            Ok(false) => anyhow::bail!(
                "No index at {}. Run `sc-index rebuild` first.",
                index_dir.display()
            ),
            Err(e) => {
                let old = rebuild::sibling_path(index_dir, rebuild::OLD_SUFFIX);
                warn!(index = %old.display(), error = %e, "Reading previous index in place");
                file = index_file(&old);
            }
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(&file)
        .read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open index: {}", index_dir.display()))?;

    Ok(pool)
}
