//! Application metadata parsers.
//!
//! Every metadata source is adapted to the [`AppInfoParser`] read contract.
//! Callers ask for logical desktop-entry keys (`Name`, `Comment`,
//! `X-AppInstall-Package`, ...) and each parser maps them onto its own
//! record shape:
//!
//! | Parser | Source |
//! |--------|--------|
//! | [`desktop::DesktopParser`] | `.desktop` key files |
//! | [`appstream::AppStreamParser`] | AppStream `<applications>` XML |
//! | [`json::JsonTagSectionParser`] | list-of-objects JSON feeds |
//! | [`agent::AgentParser`] | applications offered by the software-center agent |
//! | [`agent::PurchasedParser`] | purchased subscriptions from the agent |
//! | [`tag_section::TagSectionParser`] | apt `*AppInfo` deb822 lists |
//!
//! A parser is built for one record, used for one document, then dropped.

pub mod agent;
pub mod appstream;
pub mod desktop;
pub mod json;
pub mod tag_section;

use thiserror::Error;

/// Prefix carried by software-center specific desktop keys.
pub const APPINSTALL_PREFIX: &str = "X-AppInstall-";

#[derive(Debug, Error)]
pub enum ParseError {
    /// The record has no value for the key. Check `has_option_desktop` first.
    #[error("key not found: {0}")]
    MissingKey(String),

    #[error("malformed record in {origin}: {message}")]
    Malformed { origin: String, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Common read interface over one application record.
pub trait AppInfoParser {
    /// Value of a logical key, translated when `translated` is set and the
    /// source carries translations.
    fn get_desktop(&self, key: &str, translated: bool) -> Result<String, ParseError>;

    /// Whether the key is present, without forcing a translation lookup.
    fn has_option_desktop(&self, key: &str) -> bool;

    /// Where the record came from: file path, XML id or origin label.
    fn desktopf(&self) -> String;

    fn get_desktop_categories(&self) -> Vec<String> {
        self.get_desktop_list("Categories", ';')
    }

    fn get_desktop_mimetypes(&self) -> Vec<String> {
        self.get_desktop_list("MimeType", ';')
    }

    /// Split a list-valued key, dropping empty items.
    fn get_desktop_list(&self, key: &str, separator: char) -> Vec<String> {
        if !self.has_option_desktop(key) {
            return Vec::new();
        }
        match self.get_desktop(key, false) {
            Ok(value) => split_list(&value, separator),
            Err(_) => Vec::new(),
        }
    }
}

/// `X-AppInstall-Package` -> `Package`.
pub fn strip_appinstall_prefix(key: &str) -> &str {
    key.strip_prefix(APPINSTALL_PREFIX).unwrap_or(key)
}

/// Strip the prefix, then translate through a static key table.
pub fn apply_mapping<'a>(mapping: &[(&'static str, &'static str)], key: &'a str) -> &'a str {
    let key = strip_appinstall_prefix(key);
    mapping
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| *to)
        .unwrap_or(key)
}

pub fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a JSON field the way list- and string-valued keys are read.
///
/// Arrays join with `;`, objects are re-serialized, `null` is absent.
pub(crate) fn json_value_to_string(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(json_value_to_string)
                .collect::<Vec<_>>()
                .join(";"),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}
