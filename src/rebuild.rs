//! Full index rebuild.
//!
//! Sources are read one after another (desktop files, AppStream, apt
//! AppInfo lists, JSON feeds, agent payloads) and every record goes through
//! the document builder into one store. The new index is built at
//! `<path>_rb` and only replaces `<path>` once it is committed, so an
//! interrupted or failed rebuild leaves the live index untouched.
//!
//! Error severities:
//!
//! | Scope | Example | Effect |
//! |-------|---------|--------|
//! | record | malformed stanza, missing name | logged, record skipped |
//! | source | directory missing, feed unreachable | logged, source adds nothing |
//! | batch | index path unwritable, store failure | rebuild aborted |

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::builder::{BuildOutcome, DocumentBuilder, SystemInfo};
use crate::cataloged::CatalogedTimes;
use crate::config::Config;
use crate::db;
use crate::i18n::Translations;
use crate::models::{
    IndexDocument, ValueSlot, META_BUILD_TIME, META_CONTENT_HASH, META_DOCUMENT_COUNT, META_GENERATION,
    META_POPCON_MAX, META_SCHEMA_VERSION,
};
use crate::packages::AptPackageCache;
use crate::parsers::agent::{AgentParser, PurchasedParser, AGENT_ORIGIN};
use crate::parsers::appstream::read_appstream_file;
use crate::parsers::desktop::DesktopParser;
use crate::parsers::json::parse_json_feed;
use crate::parsers::tag_section::read_tag_file;
use crate::parsers::AppInfoParser;
use crate::progress::{ProgressEvent, ProgressMode, ProgressReporter, RebuildState};
use crate::sources::{configured_sources, is_url, Source, SourceKind};
use crate::store::memory::MemoryIndexStore;
use crate::store::sqlite::SqliteIndexStore;
use crate::store::{AddOutcome, IndexStore};
use crate::terms::spelling_words;

pub const REBUILD_SUFFIX: &str = "_rb";
pub const OLD_SUFFIX: &str = "_old";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
/// Records between cooperative yields while feeding the store.
const YIELD_EVERY: usize = 64;

/// What one source contributed.
#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    pub name: String,
    pub added: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Set when the whole source was unavailable.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub sources: Vec<SourceReport>,
    pub documents: u64,
    pub popcon_max: f64,
    pub content_hash: String,
    pub generation: String,
    pub dry_run: bool,
    pub state: RebuildState,
}

/// `<path><suffix>`, ignoring any trailing separator on `path`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.components().as_path().as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Rebuild the index described by `config`.
///
/// With `dry_run` the batch goes into memory and nothing on disk changes.
pub async fn rebuild(
    config: &Config,
    progress: &dyn ProgressReporter,
    dry_run: bool,
) -> Result<RebuildReport> {
    let live = config.index.path.components().as_path().to_path_buf();
    if !dry_run {
        restore_interrupted_swap(&live)?;
        ensure_writable(&live)?;
    }

    let packages = AptPackageCache::open(&config.packages.lists);
    let cataloged = load_cataloged_times(config);
    let env = SourceEnv::new(config)?;
    let system = SystemInfo {
        native_arch: config.system.native_arch.clone(),
        foreign_archs: config.system.foreign_archs.clone(),
        region: config.system.region.clone(),
    };
    let builder = DocumentBuilder::new(&packages, &cataloged, system);

    if dry_run {
        let mut store = MemoryIndexStore::new();
        let mut batch = Batch::new(&mut store, builder, progress);
        return batch.run(config, &env).await.map(|mut report| {
            report.dry_run = true;
            report
        });
    }

    let rebuilt = sibling_path(&live, REBUILD_SUFFIX);
    let result = async {
        remove_stale(&rebuilt)?;
        let mut store = SqliteIndexStore::create(&rebuilt).await?;
        let mut batch = Batch::new(&mut store, builder, progress);
        let report = batch.run(config, &env).await?;
        swap_into_place(&live, &rebuilt)?;
        Ok::<_, anyhow::Error>(report)
    }
    .await;

    match result {
        Ok(mut report) => {
            report.state = RebuildState::Swapped;
            progress.report(ProgressEvent {
                state: RebuildState::Swapped,
                documents: report.documents,
            });
            info!(
                index = %live.display(),
                documents = report.documents,
                generation = %report.generation,
                "Index swapped into place"
            );
            Ok(report)
        }
        Err(e) => {
            if let Err(cleanup) = remove_stale(&rebuilt) {
                warn!(path = %rebuilt.display(), error = %cleanup, "Failed to remove partial index");
            }
            progress.report(ProgressEvent {
                state: RebuildState::Aborted {
                    reason: e.to_string(),
                },
                documents: 0,
            });
            warn!(index = %live.display(), error = %e, "Rebuild aborted; previous index retained");
            Err(e)
        }
    }
}

/// CLI entry: rebuild and print a summary on stdout.
pub async fn run_rebuild(config: &Config, mode: ProgressMode, dry_run: bool) -> Result<()> {
    let reporter = mode.reporter();
    let report = rebuild(config, reporter.as_ref(), dry_run).await?;

    if report.dry_run {
        println!("rebuild (dry-run)");
    } else {
        println!("rebuild");
    }
    for source in &report.sources {
        match &source.error {
            Some(err) => println!("  {}: unavailable ({})", source.name, err),
            None => println!(
                "  {}: {} documents ({} duplicates, {} skipped, {} failed)",
                source.name, source.added, source.duplicates, source.skipped, source.failed
            ),
        }
    }
    println!("  documents: {}", report.documents);
    println!("  popcon max: {}", report.popcon_max);
    println!("  content hash: {}", report.content_hash);
    if !report.dry_run {
        println!("  generation: {}", report.generation);
        println!("  index: {}", config.index.path.display());
    }
    println!("ok");
    Ok(())
}

fn ensure_writable(live: &Path) -> Result<()> {
    if live.exists() {
        let meta = std::fs::metadata(live)
            .with_context(|| format!("Failed to stat index path: {}", live.display()))?;
        if meta.permissions().readonly() {
            bail!("Index path is not writable: {}", live.display());
        }
        let file = db::index_file(live);
        if file.exists() && std::fs::metadata(&file)?.permissions().readonly() {
            bail!("Index file is not writable: {}", file.display());
        }
    }

    let parent = match live.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create index parent: {}", parent.display()))?;
    if std::fs::metadata(parent)?.permissions().readonly() {
        bail!("Index parent directory is not writable: {}", parent.display());
    }
    // Mode bits ignore ownership.
    tempfile::Builder::new()
        .prefix(".sc-index-")
        .tempfile_in(parent)
        .with_context(|| format!("Index parent directory is not writable: {}", parent.display()))?;
    Ok(())
}

/// Move `<path>_old` back to `<path>` when a swap was killed between its
/// two renames. Returns whether anything was restored.
pub fn restore_interrupted_swap(live: &Path) -> Result<bool> {
    let live = live.components().as_path();
    let old = sibling_path(live, OLD_SUFFIX);
    if db::index_file(live).exists() || !db::index_file(&old).exists() {
        return Ok(false);
    }
    if live.exists() {
        // Only an empty directory may stand in the way.
        std::fs::remove_dir(live)
            .with_context(|| format!("Failed to clear {} before restoring", live.display()))?;
    }
    std::fs::rename(&old, live)
        .with_context(|| format!("Failed to move {} back to {}", old.display(), live.display()))?;
    warn!(index = %live.display(), "Restored index left behind by an interrupted swap");
    Ok(true)
}

fn remove_stale(path: &Path) -> Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    } else if path.exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// `live -> live_old`, `rebuilt -> live`, then drop `live_old`.
fn swap_into_place(live: &Path, rebuilt: &Path) -> Result<()> {
    let old = sibling_path(live, OLD_SUFFIX);
    let had_live = live.exists();
    // Without a live index, `_old` may be the only copy left.
    if had_live {
        remove_stale(&old)?;
        std::fs::rename(live, &old).with_context(|| {
            format!("Failed to move {} to {}", live.display(), old.display())
        })?;
    }
    if let Err(e) = std::fs::rename(rebuilt, live) {
        if had_live {
            // Put the previous index back.
            if let Err(restore) = std::fs::rename(&old, live) {
                warn!(path = %old.display(), error = %restore, "Failed to restore previous index");
            }
        }
        return Err(anyhow!(e).context(format!(
            "Failed to move {} to {}",
            rebuilt.display(),
            live.display()
        )));
    }

    if had_live {
        if let Err(e) = std::fs::remove_dir_all(&old) {
            warn!(path = %old.display(), error = %e, "Failed to remove previous index");
        }
    }
    Ok(())
}

fn load_cataloged_times(config: &Config) -> CatalogedTimes {
    let Some(table) = &config.cataloged_times else {
        return CatalogedTimes::empty();
    };
    match CatalogedTimes::load(&table.path) {
        Ok(times) => {
            debug!(path = %table.path.display(), entries = times.len(), "Loaded cataloged times");
            times
        }
        Err(e) => {
            warn!(path = %table.path.display(), error = %e, "Cataloged times unavailable");
            CatalogedTimes::empty()
        }
    }
}

/// Everything needed to turn a source into parsers.
struct SourceEnv {
    translations: Translations,
    http: reqwest::Client,
    desktop_globs: GlobSet,
    follow_symlinks: bool,
    distro_codename: Option<String>,
}

impl SourceEnv {
    fn new(config: &Config) -> Result<Self> {
        let timeout = config
            .sources
            .agent
            .as_ref()
            .map(|a| a.timeout_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("Failed to build HTTP client")?;

        let (globs, follow_symlinks) = match &config.sources.desktop {
            Some(d) => (d.include_globs.clone(), d.follow_symlinks),
            None => (Vec::new(), false),
        };

        Ok(Self {
            translations: Translations::new(
                &config.system.languages,
                config.system.locale_dir.clone(),
            ),
            http,
            desktop_globs: build_globset(&globs)?,
            follow_symlinks,
            distro_codename: config.system.distro_codename.clone(),
        })
    }

    async fn read_location(&self, location: &str) -> Result<String> {
        if is_url(location) {
            let response = self
                .http
                .get(location)
                .send()
                .await
                .with_context(|| format!("Failed to fetch {}", location))?
                .error_for_status()
                .with_context(|| format!("Failed to fetch {}", location))?;
            Ok(response.text().await?)
        } else {
            tokio::fs::read_to_string(location)
                .await
                .with_context(|| format!("Failed to read {}", location))
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Sorted files under `root` whose relative path matches `globs`.
fn list_files(root: &Path, globs: &GlobSet, follow_links: bool, max_depth: usize) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Source directory does not exist: {}", root.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(follow_links).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if globs.is_match(relative) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Records read from one source, plus the ones that could not be read.
#[derive(Default)]
struct Collected {
    parsers: Vec<Box<dyn AppInfoParser>>,
    failed: u64,
}

impl Collected {
    fn push(&mut self, parser: impl AppInfoParser + 'static) {
        self.parsers.push(Box::new(parser));
    }
}

async fn collect(source: &Source, env: &SourceEnv) -> Result<Collected> {
    let mut out = Collected::default();
    match source.kind {
        SourceKind::Desktop => {
            let files = list_files(
                Path::new(&source.location),
                &env.desktop_globs,
                env.follow_symlinks,
                usize::MAX,
            )?;
            for file in files {
                match DesktopParser::read(&file, env.translations.clone()) {
                    Ok(parser) => out.push(parser),
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "Skipping desktop file");
                        out.failed += 1;
                    }
                }
                tokio::task::yield_now().await;
            }
        }
        SourceKind::AppStream => {
            let path = Path::new(&source.location);
            let files = if path.is_file() {
                vec![path.to_path_buf()]
            } else {
                list_files(path, &build_globset(&["*.xml".to_string()])?, true, 1)?
            };
            for file in files {
                match read_appstream_file(&file, &env.translations) {
                    Ok(parsers) => parsers.into_iter().for_each(|p| out.push(p)),
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "Skipping AppStream file");
                        out.failed += 1;
                    }
                }
                tokio::task::yield_now().await;
            }
        }
        SourceKind::AptLists => {
            let files = list_files(
                Path::new(&source.location),
                &build_globset(&["*AppInfo".to_string()])?,
                true,
                1,
            )?;
            for file in files {
                match read_tag_file(&file, &env.translations) {
                    Ok(parsers) => parsers.into_iter().for_each(|p| out.push(p)),
                    Err(e) => {
                        warn!(file = %file.display(), error = %e, "Skipping AppInfo list");
                        out.failed += 1;
                    }
                }
                tokio::task::yield_now().await;
            }
        }
        SourceKind::Json => {
            let content = env.read_location(&source.location).await?;
            let origin = source.name.strip_prefix("json:").unwrap_or(source.name.as_str());
            let mut failed = 0;
            let parsers = parse_json_feed(&content, origin, |i, e| {
                warn!(source = %source.name, entry = i, error = %e, "Skipping feed entry");
                failed += 1;
            })?;
            out.failed += failed;
            parsers.into_iter().for_each(|p| out.push(p));
        }
        SourceKind::AgentAvailable => {
            let content = env.read_location(&source.location).await?;
            for app in agent_objects(&content, &source.name, &mut out.failed)? {
                out.push(AgentParser::new(app));
            }
        }
        SourceKind::AgentPurchased => {
            let content = env.read_location(&source.location).await?;
            for subscription in agent_objects(&content, &source.name, &mut out.failed)? {
                match PurchasedParser::new(subscription, env.distro_codename.as_deref()) {
                    Ok(parser) => out.push(parser),
                    Err(e) => {
                        warn!(source = %source.name, error = %e, "Skipping subscription");
                        out.failed += 1;
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Objects of an agent payload. Non-object entries are counted as failed.
fn agent_objects(content: &str, name: &str, failed: &mut u64) -> Result<Vec<Map<String, Value>>> {
    let value: Value = serde_json::from_str(content)
        .with_context(|| format!("Invalid {} payload from {}", name, AGENT_ORIGIN))?;
    let Value::Array(items) = value else {
        bail!("{} payload is not a list", name);
    };
    let mut objects = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => objects.push(map),
            _ => {
                warn!(source = %name, entry = i, "Skipping non-object entry");
                *failed += 1;
            }
        }
    }
    Ok(objects)
}

/// One batch: a builder feeding one store.
struct Batch<'a> {
    store: &'a mut dyn IndexStore,
    builder: DocumentBuilder<'a>,
    progress: &'a dyn ProgressReporter,
    hasher: Sha256,
    /// Highest popularity among the documents actually added.
    popcon_max: f64,
    state: RebuildState,
}

impl<'a> Batch<'a> {
    fn new(
        store: &'a mut dyn IndexStore,
        builder: DocumentBuilder<'a>,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            store,
            builder,
            progress,
            hasher: Sha256::new(),
            popcon_max: 0.0,
            state: RebuildState::NotStarted,
        }
    }

    fn set_state(&mut self, state: RebuildState) {
        debug!(from = self.state.label(), to = state.label(), "Rebuild state");
        self.state = state.clone();
        self.progress.report(ProgressEvent {
            state,
            documents: self.store.document_count(),
        });
    }

    async fn run(&mut self, config: &Config, env: &SourceEnv) -> Result<RebuildReport> {
        let mut reports = Vec::new();
        for source in configured_sources(config) {
            self.set_state(RebuildState::Scanning {
                source: source.name.clone(),
            });
            let mut report = SourceReport {
                name: source.name.clone(),
                ..Default::default()
            };
            match collect(&source, env).await {
                Ok(collected) => {
                    report.failed = collected.failed;
                    self.feed(&collected.parsers, &mut report).await?;
                    info!(
                        source = %source.name,
                        added = report.added,
                        skipped = report.skipped,
                        failed = report.failed,
                        "Source indexed"
                    );
                }
                Err(e) => {
                    warn!(source = %source.name, location = %source.location, error = %e, "Source unavailable");
                    report.error = Some(format!("{:#}", e));
                }
            }
            reports.push(report);
        }

        self.set_state(RebuildState::Merging);
        let documents = self.store.document_count();
        let popcon_max = self.popcon_max;
        let content_hash = hex::encode(std::mem::take(&mut self.hasher).finalize());
        let generation = Uuid::new_v4().to_string();

        self.store
            .set_metadata(META_SCHEMA_VERSION, &config.index.schema_version)
            .await?;
        self.store
            .set_metadata(META_POPCON_MAX, &popcon_max.to_string())
            .await?;
        self.store.set_metadata(META_CONTENT_HASH, &content_hash).await?;
        self.store
            .set_metadata(META_BUILD_TIME, &chrono::Utc::now().to_rfc3339())
            .await?;
        self.store.set_metadata(META_GENERATION, &generation).await?;
        self.store
            .set_metadata(META_DOCUMENT_COUNT, &documents.to_string())
            .await?;
        self.store.commit().await?;

        Ok(RebuildReport {
            sources: reports,
            documents,
            popcon_max,
            content_hash,
            generation,
            dry_run: false,
            state: self.state.clone(),
        })
    }

    /// Store errors abort the batch; everything else is per record.
    async fn feed(
        &mut self,
        parsers: &[Box<dyn AppInfoParser>],
        report: &mut SourceReport,
    ) -> Result<()> {
        for (i, parser) in parsers.iter().enumerate() {
            match self.builder.build(parser.as_ref()) {
                Ok(BuildOutcome::Document(doc)) => match self.store.add_document(&doc).await? {
                    AddOutcome::Added => {
                        hash_document(&mut self.hasher, &doc);
                        if let Some(popcon) =
                            doc.value(ValueSlot::Popcon).and_then(|v| v.as_number())
                        {
                            self.popcon_max = self.popcon_max.max(popcon);
                        }
                        if self.store.supports_spelling() {
                            for word in spelling_words(&doc) {
                                self.store.add_spelling(word).await?;
                            }
                        }
                        report.added += 1;
                    }
                    AddOutcome::Duplicate => {
                        warn!(
                            source = %report.name,
                            appname = %doc.data,
                            pkgname = doc.pkgname().unwrap_or(""),
                            "Duplicate application; keeping the first"
                        );
                        report.duplicates += 1;
                    }
                },
                Ok(BuildOutcome::Skipped(reason)) => {
                    debug!(origin = %parser.desktopf(), reason = ?reason, "Skipping record");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(origin = %parser.desktopf(), error = %e, "Failed to index record");
                    report.failed += 1;
                }
            }
            if (i + 1) % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }
        Ok(())
    }
}

fn hash_document(hasher: &mut Sha256, doc: &IndexDocument) {
    hasher.update(doc.data.as_bytes());
    hasher.update([0u8]);
    for (slot, value) in &doc.values {
        hasher.update(slot.id().to_le_bytes());
        hasher.update(value.to_string().as_bytes());
        hasher.update([0u8]);
    }
    for term in &doc.terms {
        hasher.update(term.as_bytes());
        hasher.update([0u8]);
    }
    for (term, wdf) in &doc.postings {
        hasher.update(term.as_bytes());
        hasher.update(wdf.to_le_bytes());
    }
    for (field, text) in &doc.text {
        hasher.update(field.column().as_bytes());
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DesktopSourceConfig, JsonSourceConfig};
    use crate::progress::{NoProgress, RecordingProgress};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn config_with_desktop(tmp: &TempDir) -> Config {
        let desktop = tmp.path().join("desktop");
        std::fs::create_dir_all(&desktop).unwrap();
        let mut config = Config::minimal(tmp.path().join("xapian"));
        config.system.languages = Vec::new();
        config.system.native_arch = "amd64".to_string();
        config.sources.desktop = Some(DesktopSourceConfig {
            dir: desktop,
            include_globs: vec!["*.desktop".to_string()],
            follow_symlinks: false,
        });
        config
    }

    fn app(name: &str, pkg: &str, popcon: &str) -> String {
        format!(
            "[Desktop Entry]\nName={}\nX-AppInstall-Package={}\nX-AppInstall-Popcon={}\n",
            name, pkg, popcon
        )
    }

    #[test]
    fn sibling_paths() {
        assert_eq!(
            sibling_path(Path::new("/var/cache/sc/xapian/"), REBUILD_SUFFIX),
            PathBuf::from("/var/cache/sc/xapian_rb")
        );
        assert_eq!(
            sibling_path(Path::new("idx"), OLD_SUFFIX),
            PathBuf::from("idx_old")
        );
    }

    #[tokio::test]
    async fn popcon_max_is_written() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_desktop(&tmp);
        let dir = tmp.path().join("desktop");
        write(&dir, "a.desktop", &app("A", "a", "0.1"));
        write(&dir, "b.desktop", &app("B", "b", "5.2"));
        write(&dir, "c.desktop", &app("C", "c", "3.0"));

        let report = rebuild(&config, &NoProgress, true).await.unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.popcon_max, 5.2);
        assert!(report.dry_run);
        assert!(!config.index.path.exists());
    }

    #[tokio::test]
    async fn state_machine_transitions() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_desktop(&tmp);
        write(&tmp.path().join("desktop"), "a.desktop", &app("A", "a", "1"));

        let progress = RecordingProgress::default();
        let report = rebuild(&config, &progress, false).await.unwrap();
        assert_eq!(report.state, RebuildState::Swapped);
        assert_eq!(
            progress.states(),
            vec![
                RebuildState::Scanning {
                    source: "desktop".to_string()
                },
                RebuildState::Merging,
                RebuildState::Swapped,
            ]
        );
        assert!(db::index_file(&config.index.path).exists());
        assert!(!sibling_path(&config.index.path, REBUILD_SUFFIX).exists());
        assert!(!sibling_path(&config.index.path, OLD_SUFFIX).exists());
    }

    #[tokio::test]
    async fn missing_source_does_not_stop_others() {
        let tmp = TempDir::new().unwrap();
        let mut config = config_with_desktop(&tmp);
        write(&tmp.path().join("desktop"), "a.desktop", &app("A", "a", "1"));
        config.sources.json.push(JsonSourceConfig {
            origin: "gone".to_string(),
            path: Some(tmp.path().join("missing.json")),
            url: None,
        });

        let report = rebuild(&config, &NoProgress, true).await.unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.sources.len(), 2);
        assert!(report.sources[0].error.is_none());
        assert!(report.sources[1].error.is_some());
    }

    #[tokio::test]
    async fn bad_records_are_counted_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_desktop(&tmp);
        let dir = tmp.path().join("desktop");
        write(&dir, "good.desktop", &app("Good", "good", "1"));
        write(&dir, "noname.desktop", "[Desktop Entry]\nX-AppInstall-Package=noname\n");
        write(&dir, "broken.desktop", "this is not a key file\n");
        write(&dir, "dup.desktop", &app("Good", "good", "2"));

        let report = rebuild(&config, &NoProgress, true).await.unwrap();
        let desktop = &report.sources[0];
        assert_eq!(desktop.added, 1);
        assert_eq!(desktop.duplicates, 1);
        assert_eq!(desktop.failed, 2);
    }

    struct FailingStore;

    #[async_trait]
    impl IndexStore for FailingStore {
        async fn add_document(&mut self, _doc: &IndexDocument) -> Result<AddOutcome> {
            bail!("disk full")
        }
        async fn set_metadata(&mut self, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }
        fn supports_spelling(&self) -> bool {
            false
        }
        async fn add_spelling(&mut self, _word: &str) -> Result<()> {
            Ok(())
        }
        fn document_count(&self) -> u64 {
            0
        }
        async fn commit(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn store_failure_aborts_batch() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_desktop(&tmp);
        write(&tmp.path().join("desktop"), "a.desktop", &app("A", "a", "1"));

        let packages = AptPackageCache::new();
        let cataloged = CatalogedTimes::empty();
        let builder = DocumentBuilder::new(
            &packages,
            &cataloged,
            SystemInfo {
                native_arch: "amd64".to_string(),
                foreign_archs: Vec::new(),
                region: None,
            },
        );
        let env = SourceEnv::new(&config).unwrap();
        let mut store = FailingStore;
        let mut batch = Batch::new(&mut store, builder, &NoProgress);
        let err = batch.run(&config, &env).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unwritable_index_is_left_alone() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let config = config_with_desktop(&tmp);
        write(&tmp.path().join("desktop"), "a.desktop", &app("A", "a", "1"));
        rebuild(&config, &NoProgress, false).await.unwrap();

        let live = &config.index.path;
        std::fs::set_permissions(live, std::fs::Permissions::from_mode(0o555)).unwrap();
        let err = rebuild(&config, &NoProgress, false).await.unwrap_err();
        std::fs::set_permissions(live, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(err.to_string().contains("not writable"));
        assert!(db::index_file(live).exists());
        assert!(!sibling_path(live, REBUILD_SUFFIX).exists());
    }

    async fn live_document_count(live: &Path) -> i64 {
        let pool = db::open_reader(live).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&pool)
            .await
            .unwrap();
        pool.close().await;
        count
    }

    #[tokio::test]
    async fn duplicates_do_not_raise_popcon_max() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_desktop(&tmp);
        let dir = tmp.path().join("desktop");
        write(&dir, "a1.desktop", &app("A", "a", "1.0"));
        write(&dir, "a2.desktop", &app("A", "a", "9.0"));

        let report = rebuild(&config, &NoProgress, true).await.unwrap();
        assert_eq!(report.documents, 1);
        assert_eq!(report.sources[0].duplicates, 1);
        assert_eq!(report.popcon_max, 1.0);
    }

    #[tokio::test]
    async fn reader_restores_index_stranded_mid_swap() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_desktop(&tmp);
        write(&tmp.path().join("desktop"), "a.desktop", &app("A", "a", "1"));
        rebuild(&config, &NoProgress, false).await.unwrap();

        // Killed after `live -> live_old`, before `live_rb -> live`.
        let live = &config.index.path;
        let old = sibling_path(live, OLD_SUFFIX);
        std::fs::rename(live, &old).unwrap();

        assert_eq!(live_document_count(live).await, 1);
        assert!(db::index_file(live).exists());
        assert!(!old.exists());
    }

    #[tokio::test]
    async fn rebuild_restores_index_stranded_mid_swap() {
        let tmp = TempDir::new().unwrap();
        let config = config_with_desktop(&tmp);
        let dir = tmp.path().join("desktop");
        write(&dir, "a.desktop", &app("A", "a", "1"));
        rebuild(&config, &NoProgress, false).await.unwrap();

        let live = &config.index.path;
        let old = sibling_path(live, OLD_SUFFIX);
        std::fs::rename(live, &old).unwrap();
        assert!(restore_interrupted_swap(live).unwrap());
        assert!(!restore_interrupted_swap(live).unwrap());

        std::fs::rename(live, &old).unwrap();
        write(&dir, "b.desktop", &app("B", "b", "2"));
        rebuild(&config, &NoProgress, false).await.unwrap();
        assert_eq!(live_document_count(live).await, 2);
        assert!(!old.exists());
    }

    #[tokio::test]
    async fn swap_without_live_keeps_previous_copy() {
        let tmp = TempDir::new().unwrap();
        let live = tmp.path().join("xapian");
        let old = sibling_path(&live, OLD_SUFFIX);
        let rebuilt = sibling_path(&live, REBUILD_SUFFIX);
        std::fs::create_dir_all(&old).unwrap();
        std::fs::write(old.join("marker"), "previous").unwrap();
        std::fs::create_dir_all(&rebuilt).unwrap();

        swap_into_place(&live, &rebuilt).unwrap();
        assert!(live.exists());
        assert!(old.join("marker").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unwritable_parent_fails_before_building() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let mut config = config_with_desktop(&tmp);
        write(&tmp.path().join("desktop"), "a.desktop", &app("A", "a", "1"));
        let parent = tmp.path().join("locked");
        std::fs::create_dir_all(&parent).unwrap();
        config.index.path = parent.join("xapian");

        std::fs::set_permissions(&parent, std::fs::Permissions::from_mode(0o555)).unwrap();
        let result = rebuild(&config, &NoProgress, false).await;
        std::fs::set_permissions(&parent, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("not writable"));
        assert!(!sibling_path(&config.index.path, REBUILD_SUFFIX).exists());
        assert!(!config.index.path.exists());
    }

    #[tokio::test]
    async fn json_origin_keeps_inner_prefix() {
        let tmp = TempDir::new().unwrap();
        let feed = tmp.path().join("feed.json");
        std::fs::write(
            &feed,
            r#"[{"application_name": "X", "package_name": "x"}]"#,
        )
        .unwrap();
        let mut config = Config::minimal(tmp.path().join("xapian"));
        config.sources.json = vec![JsonSourceConfig {
            origin: "json:x".to_string(),
            path: Some(feed),
            url: None,
        }];

        let env = SourceEnv::new(&config).unwrap();
        let sources = configured_sources(&config);
        assert_eq!(sources[0].name, "json:json:x");
        let collected = collect(&sources[0], &env).await.unwrap();
        assert_eq!(collected.parsers[0].desktopf(), "json:x");
    }
}
