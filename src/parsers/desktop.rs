//! `.desktop` key-file parser.
//!
//! Only the `[Desktop Entry]` group is read. Translations are resolved in
//! this order: the gettext catalog of `X-Ubuntu-Gettext-Domain` (or
//! `X-GNOME-Gettext-Domain`), then `Key[lang_COUNTRY]`, then `Key[lang]`,
//! then the untranslated key.

use std::collections::HashMap;
use std::path::Path;

use super::{AppInfoParser, ParseError};
use crate::i18n::Translations;

const DESKTOP_ENTRY: &str = "Desktop Entry";
const GETTEXT_DOMAIN_KEYS: [&str; 2] = ["X-Ubuntu-Gettext-Domain", "X-GNOME-Gettext-Domain"];

pub struct DesktopParser {
    entries: HashMap<String, String>,
    origfile: String,
    translations: Translations,
}

impl DesktopParser {
    pub fn read(path: &Path, translations: Translations) -> Result<Self, ParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string(), translations)
    }

    pub fn parse(
        content: &str,
        origfile: &str,
        translations: Translations,
    ) -> Result<Self, ParseError> {
        let mut entries = HashMap::new();
        let mut group: Option<&str> = None;

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                let name = line
                    .strip_prefix('[')
                    .and_then(|l| l.strip_suffix(']'))
                    .ok_or_else(|| ParseError::Malformed {
                        origin: origfile.to_string(),
                        message: format!("line {}: bad group header '{}'", lineno + 1, line),
                    })?;
                group = Some(name);
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| ParseError::Malformed {
                origin: origfile.to_string(),
                message: format!("line {}: expected key=value, got '{}'", lineno + 1, line),
            })?;
            if group == Some(DESKTOP_ENTRY) {
                entries
                    .entry(key.trim().to_string())
                    .or_insert_with(|| unescape(value.trim()));
            }
        }

        Ok(Self {
            entries,
            origfile: origfile.to_string(),
            translations,
        })
    }

    fn gettext_domain(&self) -> Option<&str> {
        GETTEXT_DOMAIN_KEYS
            .iter()
            .find_map(|k| self.entries.get(*k))
            .map(String::as_str)
    }
}

impl AppInfoParser for DesktopParser {
    fn get_desktop(&self, key: &str, translated: bool) -> Result<String, ParseError> {
        if translated {
            if let (Some(domain), Some(value)) = (self.gettext_domain(), self.entries.get(key)) {
                if let Some(t) = self.translations.dgettext(domain, value) {
                    if &t != value {
                        return Ok(t);
                    }
                }
            }
            for lang in self.translations.languages() {
                if let Some(v) = self.entries.get(&format!("{}[{}]", key, lang)) {
                    return Ok(v.clone());
                }
            }
        }
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| ParseError::MissingKey(key.to_string()))
    }

    fn has_option_desktop(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn desktopf(&self) -> String {
        self.origfile.clone()
    }
}

/// Resolve key-file escapes (`\s`, `\n`, `\t`, `\r`, `\\`).
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::build_mo;
    use tempfile::TempDir;

    const GIMP: &str = "\
# comment
[Desktop Entry]
X-AppInstall-Package=gimp
X-AppInstall-Popcon=5.2
Name=GIMP Image Editor
Name[de]=GIMP Bildbearbeitung
Name[de_AT]=GIMP fuer Oesterreich
Comment=Create images and edit photographs
Categories=Graphics;2DGraphics;RasterGraphics;
MimeType=image/png;image/jpeg;
Exec=gimp-2.8 %U

[Desktop Action New]
Name=New Window
";

    #[test]
    fn reads_desktop_entry_group_only() {
        let p = DesktopParser::parse(GIMP, "gimp.desktop", Translations::untranslated()).unwrap();
        assert_eq!(p.get_desktop("Name", true).unwrap(), "GIMP Image Editor");
        assert_eq!(p.get_desktop("X-AppInstall-Package", false).unwrap(), "gimp");
        assert_eq!(
            p.get_desktop_categories(),
            vec!["Graphics", "2DGraphics", "RasterGraphics"]
        );
        assert_eq!(p.get_desktop_mimetypes(), vec!["image/png", "image/jpeg"]);
        assert_eq!(p.desktopf(), "gimp.desktop");
    }

    #[test]
    fn locale_keys_follow_language_order() {
        let tr = Translations::new(&["de_DE".to_string()], "/nonexistent");
        let p = DesktopParser::parse(GIMP, "gimp.desktop", tr).unwrap();
        assert_eq!(p.get_desktop("Name", true).unwrap(), "GIMP Bildbearbeitung");
        assert_eq!(p.get_desktop("Name", false).unwrap(), "GIMP Image Editor");

        let tr = Translations::new(&["de_AT".to_string()], "/nonexistent");
        let p = DesktopParser::parse(GIMP, "gimp.desktop", tr).unwrap();
        assert_eq!(p.get_desktop("Name", true).unwrap(), "GIMP fuer Oesterreich");
    }

    #[test]
    fn gettext_domain_wins_over_locale_keys() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("de").join("LC_MESSAGES");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("gimp20.mo"),
            build_mo(&[("GIMP Image Editor", "GIMP-Bildeditor")]),
        )
        .unwrap();
        let content = format!("{}X-Ubuntu-Gettext-Domain=gimp20\n", GIMP.split("[Desktop Action").next().unwrap());
        let tr = Translations::new(&["de".to_string()], tmp.path());
        let p = DesktopParser::parse(&content, "gimp.desktop", tr).unwrap();
        assert_eq!(p.get_desktop("Name", true).unwrap(), "GIMP-Bildeditor");
        // Not in the catalog: fall through to the locale key.
        assert_eq!(
            p.get_desktop("Comment", true).unwrap(),
            "Create images and edit photographs"
        );
    }

    #[test]
    fn missing_key_is_reported() {
        let p = DesktopParser::parse(GIMP, "gimp.desktop", Translations::untranslated()).unwrap();
        assert!(!p.has_option_desktop("GenericName"));
        assert!(matches!(
            p.get_desktop("GenericName", true),
            Err(ParseError::MissingKey(k)) if k == "GenericName"
        ));
    }

    #[test]
    fn malformed_line_fails_the_record() {
        let err = DesktopParser::parse(
            "[Desktop Entry]\nName=x\nthis line is junk\n",
            "bad.desktop",
            Translations::untranslated(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ParseError::Malformed { .. }));
    }

    #[test]
    fn unescapes_values() {
        assert_eq!(unescape(r"a\sb\nc\\d"), "a b\nc\\d");
    }
}
