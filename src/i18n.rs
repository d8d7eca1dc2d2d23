//! Language preferences and gettext message catalogs.
//!
//! Desktop entries that name an `X-Ubuntu-Gettext-Domain` are translated
//! through the compiled `.mo` catalog of that domain before any
//! `Key[locale]` variants are consulted. Catalogs are looked up under
//! `<locale_dir>/<lang>/LC_MESSAGES/<domain>.mo` for every preferred
//! language and loaded at most once per domain.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use tracing::debug;

const MO_MAGIC_LE: u32 = 0x9504_12de;
const MO_MAGIC_BE: u32 = 0xde12_0495;

/// Ordered language preference from the usual locale environment variables.
///
/// `LANGUAGE` may carry a colon-separated list; the others carry a single
/// locale such as `de_DE.UTF-8@euro`, which is reduced to `de_DE`.
pub fn languages_from_env() -> Vec<String> {
    let mut langs = Vec::new();
    if let Ok(list) = std::env::var("LANGUAGE") {
        for l in list.split(':') {
            push_locale(&mut langs, l);
        }
    }
    for var in ["LC_ALL", "LC_MESSAGES", "LANG"] {
        if let Ok(v) = std::env::var(var) {
            push_locale(&mut langs, &v);
            if !langs.is_empty() {
                break;
            }
        }
    }
    langs
}

fn push_locale(langs: &mut Vec<String>, raw: &str) {
    let base = raw
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return;
    }
    if !langs.contains(&base) {
        langs.push(base);
    }
}

/// Expand `de_DE` into `["de_DE", "de"]`, keeping preference order.
pub fn expand_languages(langs: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for lang in langs {
        if !out.contains(lang) {
            out.push(lang.clone());
        }
        if let Some((short, _)) = lang.split_once('_') {
            let short = short.to_string();
            if !out.contains(&short) {
                out.push(short);
            }
        }
    }
    out
}

/// A single compiled gettext catalog.
#[derive(Debug, Default)]
pub struct MoCatalog {
    messages: HashMap<String, String>,
}

impl MoCatalog {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 20 {
            bail!("catalog too short ({} bytes)", bytes.len());
        }
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let big_endian = match magic {
            MO_MAGIC_LE => false,
            MO_MAGIC_BE => true,
            other => bail!("bad catalog magic {:#x}", other),
        };
        let read_u32 = |offset: usize| -> Result<u32> {
            let b = bytes
                .get(offset..offset + 4)
                .context("catalog header out of bounds")?;
            let arr = [b[0], b[1], b[2], b[3]];
            Ok(if big_endian {
                u32::from_be_bytes(arr)
            } else {
                u32::from_le_bytes(arr)
            })
        };
        let read_str = |table: usize, i: usize| -> Result<&str> {
            let len = read_u32(table + i * 8)? as usize;
            let off = read_u32(table + i * 8 + 4)? as usize;
            let raw = bytes
                .get(off..off + len)
                .context("catalog string out of bounds")?;
            std::str::from_utf8(raw).context("catalog string is not UTF-8")
        };

        let count = read_u32(8)? as usize;
        let originals = read_u32(12)? as usize;
        let translations = read_u32(16)? as usize;

        let mut messages = HashMap::with_capacity(count);
        for i in 0..count {
            let msgid = read_str(originals, i)?;
            // The empty msgid carries the catalog header.
            if msgid.is_empty() {
                continue;
            }
            let msgstr = read_str(translations, i)?;
            let singular_id = msgid.split('\0').next().unwrap_or(msgid);
            let singular_str = msgstr.split('\0').next().unwrap_or(msgstr);
            if !singular_str.is_empty() {
                messages.insert(singular_id.to_string(), singular_str.to_string());
            }
        }
        Ok(Self { messages })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
        Self::parse(&bytes)
    }

    pub fn get(&self, msgid: &str) -> Option<&str> {
        self.messages.get(msgid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Lazily loaded catalogs for all domains, shared by every parser of a batch.
#[derive(Clone)]
pub struct Translations {
    languages: Vec<String>,
    locale_dir: PathBuf,
    domains: Arc<Mutex<HashMap<String, Arc<Vec<MoCatalog>>>>>,
}

impl Translations {
    pub fn new(languages: &[String], locale_dir: impl Into<PathBuf>) -> Self {
        Self {
            languages: expand_languages(languages),
            locale_dir: locale_dir.into(),
            domains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// No catalogs and no preferred languages; every lookup is untranslated.
    pub fn untranslated() -> Self {
        Self::new(&[], PathBuf::new())
    }

    /// Preferred languages, most specific first.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Translate `msgid` in `domain`. Returns `None` when no catalog has it.
    pub fn dgettext(&self, domain: &str, msgid: &str) -> Option<String> {
        let catalogs = self.catalogs_for(domain);
        catalogs
            .iter()
            .find_map(|c| c.get(msgid))
            .map(str::to_string)
    }

    fn catalogs_for(&self, domain: &str) -> Arc<Vec<MoCatalog>> {
        let mut domains = match self.domains.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(found) = domains.get(domain) {
            return found.clone();
        }
        let mut loaded = Vec::new();
        for lang in &self.languages {
            let path = self
                .locale_dir
                .join(lang)
                .join("LC_MESSAGES")
                .join(format!("{}.mo", domain));
            if !path.exists() {
                continue;
            }
            match MoCatalog::load(&path) {
                Ok(catalog) => loaded.push(catalog),
                Err(e) => debug!(path = %path.display(), error = %e, "Ignoring unreadable catalog"),
            }
        }
        let loaded = Arc::new(loaded);
        domains.insert(domain.to_string(), loaded.clone());
        loaded
    }
}

#[cfg(test)]
pub(crate) fn build_mo(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut sorted: Vec<(&str, &str)> = entries.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let n = sorted.len() as u32;
    let orig_table = 28u32;
    let trans_table = orig_table + n * 8;
    let mut strings_off = trans_table + n * 8;

    let mut out = Vec::new();
    for v in [MO_MAGIC_LE, 0, n, orig_table, trans_table, 0, 0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    let mut orig_entries = Vec::new();
    let mut trans_entries = Vec::new();
    let mut blob = Vec::new();
    for (id, _) in &sorted {
        orig_entries.push((id.len() as u32, strings_off));
        blob.extend_from_slice(id.as_bytes());
        blob.push(0);
        strings_off += id.len() as u32 + 1;
    }
    for (_, s) in &sorted {
        trans_entries.push((s.len() as u32, strings_off));
        blob.extend_from_slice(s.as_bytes());
        blob.push(0);
        strings_off += s.len() as u32 + 1;
    }
    for (len, off) in orig_entries.into_iter().chain(trans_entries) {
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(&blob);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn expand_adds_short_forms() {
        let langs = vec!["de_DE".to_string(), "fr".to_string(), "de_AT".to_string()];
        assert_eq!(expand_languages(&langs), vec!["de_DE", "de", "fr", "de_AT"]);
    }

    #[test]
    fn push_locale_strips_encoding_and_modifier() {
        let mut langs = Vec::new();
        push_locale(&mut langs, "pt_BR.UTF-8@latin");
        push_locale(&mut langs, "C");
        push_locale(&mut langs, "pt_BR");
        assert_eq!(langs, vec!["pt_BR"]);
    }

    #[test]
    fn parses_catalog_and_skips_header() {
        let bytes = build_mo(&[("", "Project-Id-Version: x\n"), ("Editor", "Bearbeiter")]);
        let cat = MoCatalog::parse(&bytes).unwrap();
        assert_eq!(cat.len(), 1);
        assert_eq!(cat.get("Editor"), Some("Bearbeiter"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(MoCatalog::parse(b"not a catalog at all!!").is_err());
    }

    #[test]
    fn dgettext_uses_language_order() {
        let tmp = TempDir::new().unwrap();
        for (lang, text) in [("de", "Bild"), ("fr", "Image")] {
            let dir = tmp.path().join(lang).join("LC_MESSAGES");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("app.mo"), build_mo(&[("Picture", text)])).unwrap();
        }
        let tr = Translations::new(&["de_DE".to_string(), "fr".to_string()], tmp.path());
        assert_eq!(tr.dgettext("app", "Picture").as_deref(), Some("Bild"));
        assert_eq!(tr.dgettext("app", "Unknown"), None);
        assert_eq!(tr.dgettext("other", "Picture"), None);
    }
}
