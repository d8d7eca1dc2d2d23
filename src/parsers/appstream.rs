//! AppStream XML parser.
//!
//! A file holds one `<applications>` root with many `<application>`
//! children. Each child becomes one [`AppStreamParser`]. Localized elements
//! carry an `xml:lang` attribute; lookups prefer the configured languages
//! and fall back to the element without one.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{apply_mapping, AppInfoParser, ParseError};
use crate::i18n::Translations;

const MAPPING: &[(&str, &str)] = &[
    ("Name", "name"),
    ("Comment", "summary"),
    ("Package", "pkgname"),
    ("Categories", "appcategories"),
    ("Keywords", "keywords"),
    ("MimeType", "mimetypes"),
    ("Icon", "icon"),
];

/// List containers and the name of their item elements.
const LISTS: &[(&str, &str)] = &[
    ("appcategories", "appcategory"),
    ("keywords", "keyword"),
    ("mimetypes", "mimetype"),
];

const STATIC_DATA: &[(&str, &str)] = &[("Type", "Application")];

/// Minimal element tree; only what the parser reads is kept.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub lang: Option<String>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn find(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

pub struct AppStreamParser {
    appinfo: XmlElement,
    xmlfile: String,
    translations: Translations,
}

impl AppStreamParser {
    pub fn new(appinfo: XmlElement, xmlfile: &str, translations: Translations) -> Self {
        Self {
            appinfo,
            xmlfile: xmlfile.to_string(),
            translations,
        }
    }

    fn parse_with_lists(&self, container: &str, item: &str) -> String {
        self.appinfo
            .children_named(container)
            .flat_map(|list| list.children_named(item))
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl AppInfoParser for AppStreamParser {
    fn get_desktop(&self, key: &str, translated: bool) -> Result<String, ParseError> {
        if let Some((_, v)) = STATIC_DATA.iter().find(|(k, _)| *k == key) {
            return Ok(v.to_string());
        }
        let mapped = apply_mapping(MAPPING, key);
        if let Some((container, item)) = LISTS.iter().find(|(c, _)| *c == mapped) {
            if self.appinfo.find(container).is_none() {
                return Err(ParseError::MissingKey(key.to_string()));
            }
            return Ok(self.parse_with_lists(container, item));
        }

        let candidates: Vec<&XmlElement> = self.appinfo.children_named(mapped).collect();
        if translated {
            for lang in self.translations.languages() {
                let hit = candidates
                    .iter()
                    .find(|c| c.lang.as_deref() == Some(lang.as_str()));
                if let Some(hit) = hit {
                    return Ok(hit.text.clone());
                }
            }
        }
        candidates
            .iter()
            .find(|c| c.lang.is_none())
            .or_else(|| candidates.first())
            .map(|c| c.text.clone())
            .ok_or_else(|| ParseError::MissingKey(key.to_string()))
    }

    fn has_option_desktop(&self, key: &str) -> bool {
        if STATIC_DATA.iter().any(|(k, _)| *k == key) {
            return true;
        }
        self.appinfo.find(apply_mapping(MAPPING, key)).is_some()
    }

    fn desktopf(&self) -> String {
        self.appinfo
            .find("id")
            .map(|e| e.text.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.xmlfile.clone())
    }
}

/// Parse one AppStream file into one parser per `<application>`.
pub fn read_appstream_file(
    path: &Path,
    translations: &Translations,
) -> Result<Vec<AppStreamParser>, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_appstream(&content, &path.display().to_string(), translations)
}

pub fn parse_appstream(
    content: &str,
    xmlfile: &str,
    translations: &Translations,
) -> Result<Vec<AppStreamParser>, ParseError> {
    let root = parse_tree(content, xmlfile)?;
    if root.name != "applications" {
        return Err(ParseError::Malformed {
            origin: xmlfile.to_string(),
            message: format!("expected <applications> root, got <{}>", root.name),
        });
    }
    Ok(root
        .children
        .into_iter()
        .filter(|c| c.name == "application")
        .map(|app| AppStreamParser::new(app, xmlfile, translations.clone()))
        .collect())
}

fn element_from_start(e: &BytesStart<'_>, origin: &str) -> Result<XmlElement, ParseError> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
    let mut lang = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(origin, err))?;
        if attr.key.as_ref() == b"xml:lang" {
            let value = attr.unescape_value().map_err(|err| malformed(origin, err))?;
            lang = Some(value.to_string());
        }
    }
    Ok(XmlElement {
        name,
        lang,
        ..Default::default()
    })
}

fn parse_tree(content: &str, origin: &str) -> Result<XmlElement, ParseError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from_start(&e, origin)?),
            Ok(Event::Empty(e)) => {
                let elem = element_from_start(&e, origin)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(elem),
                    None => root = Some(elem),
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(current) = stack.last_mut() {
                    let text = t.unescape().map_err(|err| malformed(origin, err))?;
                    current.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let done = stack.pop().ok_or_else(|| ParseError::Malformed {
                    origin: origin.to_string(),
                    message: "unbalanced closing tag".to_string(),
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => root = Some(done),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(origin, e)),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::Malformed {
            origin: origin.to_string(),
            message: "unexpected end of document".to_string(),
        });
    }
    root.ok_or_else(|| ParseError::Malformed {
        origin: origin.to_string(),
        message: "empty document".to_string(),
    })
}

fn malformed(origin: &str, err: impl std::fmt::Display) -> ParseError {
    ParseError::Malformed {
        origin: origin.to_string(),
        message: err.to_string(),
    }
}
