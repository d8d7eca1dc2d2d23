//! Parser for apt `*AppInfo` lists: deb822 paragraphs, one per application.
//!
//! Keys are the desktop keys without the `X-AppInstall-` prefix. A
//! translated lookup tries `Key-<lang>` fields first.

use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;

use debian_packaging::control::ControlParagraphReader;

use super::{strip_appinstall_prefix, AppInfoParser, ParseError};
use crate::i18n::Translations;

pub struct TagSectionParser {
    fields: HashMap<String, String>,
    tagfile: String,
    translations: Translations,
}

impl TagSectionParser {
    pub fn new(fields: HashMap<String, String>, tagfile: &str, translations: Translations) -> Self {
        Self {
            fields,
            tagfile: tagfile.to_string(),
            translations,
        }
    }
}

impl AppInfoParser for TagSectionParser {
    fn get_desktop(&self, key: &str, translated: bool) -> Result<String, ParseError> {
        let key = strip_appinstall_prefix(key);
        if translated {
            for lang in self.translations.languages() {
                if let Some(v) = self.fields.get(&format!("{}-{}", key, lang)) {
                    return Ok(v.clone());
                }
            }
        }
        self.fields
            .get(key)
            .cloned()
            .ok_or_else(|| ParseError::MissingKey(key.to_string()))
    }

    fn has_option_desktop(&self, key: &str) -> bool {
        self.fields.contains_key(strip_appinstall_prefix(key))
    }

    fn desktopf(&self) -> String {
        self.tagfile.clone()
    }
}

/// Read every paragraph of an AppInfo file.
pub fn read_tag_file(
    path: &Path,
    translations: &Translations,
) -> Result<Vec<TagSectionParser>, ParseError> {
    let origin = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|source| ParseError::Io {
        path: origin.clone(),
        source,
    })?;
    parse_paragraphs(
        ControlParagraphReader::new(BufReader::new(file)),
        &origin,
        translations,
    )
}

pub fn parse_tag_str(
    content: &str,
    origin: &str,
    translations: &Translations,
) -> Result<Vec<TagSectionParser>, ParseError> {
    parse_paragraphs(
        ControlParagraphReader::new(BufReader::new(content.as_bytes())),
        origin,
        translations,
    )
}

fn parse_paragraphs<R: std::io::BufRead>(
    reader: ControlParagraphReader<R>,
    origin: &str,
    translations: &Translations,
) -> Result<Vec<TagSectionParser>, ParseError> {
    let mut parsers = Vec::new();
    for paragraph in reader {
        let paragraph = paragraph.map_err(|e| ParseError::Malformed {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        let fields = paragraph
            .iter_fields()
            .map(|f| (f.name().to_string(), f.value_str().to_string()))
            .collect();
        parsers.push(TagSectionParser::new(fields, origin, translations.clone()));
    }
    Ok(parsers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPINFO: &str = "\
Package: inkscape
Name: Inkscape Vector Graphics Editor
Name-de: Inkscape Vektorgrafik
Categories: Graphics;VectorGraphics;
Popcon: 1200

Package: bzr-explorer
Name: Bazaar Explorer
";

    #[test]
    fn paragraphs_become_parsers() {
        let tr = Translations::new(&["de".to_string()], "/nonexistent");
        let parsers = parse_tag_str(APPINFO, "lists/x_AppInfo", &tr).unwrap();
        assert_eq!(parsers.len(), 2);
        let p = &parsers[0];
        assert_eq!(p.get_desktop("X-AppInstall-Package", false).unwrap(), "inkscape");
        assert_eq!(p.get_desktop("Name", true).unwrap(), "Inkscape Vektorgrafik");
        assert_eq!(p.get_desktop("Name", false).unwrap(), "Inkscape Vector Graphics Editor");
        assert!(p.has_option_desktop("X-AppInstall-Popcon"));
        assert_eq!(p.get_desktop_categories(), vec!["Graphics", "VectorGraphics"]);
        assert_eq!(parsers[1].desktopf(), "lists/x_AppInfo");
    }
}
