//! JSON feed parser: a list of flat objects, one per application.

use serde_json::{Map, Value};

use super::{apply_mapping, json_value_to_string, AppInfoParser, ParseError};

const MAPPING: &[(&str, &str)] = &[
    ("Name", "application_name"),
    ("Comment", "description"),
    ("Price", "price"),
    ("Package", "package_name"),
    ("Categories", "categories"),
];

pub struct JsonTagSectionParser {
    tag_section: Map<String, Value>,
    origin: String,
}

impl JsonTagSectionParser {
    pub fn new(tag_section: Map<String, Value>, origin: &str) -> Self {
        Self {
            tag_section,
            origin: origin.to_string(),
        }
    }
}

impl AppInfoParser for JsonTagSectionParser {
    fn get_desktop(&self, key: &str, _translated: bool) -> Result<String, ParseError> {
        self.tag_section
            .get(apply_mapping(MAPPING, key))
            .and_then(json_value_to_string)
            .ok_or_else(|| ParseError::MissingKey(key.to_string()))
    }

    fn has_option_desktop(&self, key: &str) -> bool {
        self.tag_section
            .get(apply_mapping(MAPPING, key))
            .is_some_and(|v| !v.is_null())
    }

    fn desktopf(&self) -> String {
        self.origin.clone()
    }
}

/// Split a JSON feed into parsers. Entries that are not objects are
/// reported through `on_skip` and dropped.
pub fn parse_json_feed(
    json: &str,
    origin: &str,
    mut on_skip: impl FnMut(usize, ParseError),
) -> Result<Vec<JsonTagSectionParser>, ParseError> {
    let value: Value = serde_json::from_str(json).map_err(|e| ParseError::Malformed {
        origin: origin.to_string(),
        message: e.to_string(),
    })?;
    let Value::Array(items) = value else {
        return Err(ParseError::Malformed {
            origin: origin.to_string(),
            message: "expected a JSON list of objects".to_string(),
        });
    };

    let mut parsers = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => parsers.push(JsonTagSectionParser::new(map, origin)),
            other => on_skip(
                i,
                ParseError::Malformed {
                    origin: origin.to_string(),
                    message: format!("entry {} is not an object: {}", i, other),
                },
            ),
        }
    }
    Ok(parsers)
}
