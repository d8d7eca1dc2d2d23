//! Parsers for software-center agent payloads.
//!
//! [`AgentParser`] reads an application offered by the agent;
//! [`PurchasedParser`] reads a purchased subscription, which wraps an
//! application and shadows some of its fields. Payload quirks are fixed up
//! once at construction so the read side stays a plain key lookup.

use serde_json::{Map, Value};

use super::{apply_mapping, json_value_to_string, split_list, AppInfoParser, ParseError};
use crate::models::{AVAILABLE_FOR_PURCHASE_CHANNEL, PURCHASED_NEEDS_REINSTALL_CHANNEL};

/// Label used as `desktopf` for every agent record.
pub const AGENT_ORIGIN: &str = "software-center-agent";

const MAPPING: &[(&str, &str)] = &[
    ("Name", "name"),
    ("Price", "price"),
    ("Package", "package_name"),
    ("Categories", "categories"),
    ("Channel", "channel"),
    ("Signing-Key-Id", "signing_key_id"),
    ("License", "license"),
    ("Date-Published", "date_published"),
    ("PPA", "archive_id"),
    ("Screenshot-Url", "screenshot_url"),
    ("Thumbnail-Url", "thumbnail_url"),
    ("Video-Url", "video_embedded_html_url"),
    ("Icon-Url", "icon_url"),
    ("Support-Url", "support_url"),
    ("Description", "Description"),
    ("Comment", "Comment"),
    ("Version", "version"),
    ("Supported-Distros", "series"),
    ("Tags", "Tags"),
    ("Keywords", "keywords"),
    ("Deb-Line", "deb_line"),
    ("Purchased-Date", "purchase_date"),
    ("License-Key", "license_key"),
    ("License-Key-Path", "license_key_path"),
];

const STATIC_DATA: &[(&str, &str)] = &[("Type", "Application")];

pub struct AgentParser {
    application: Map<String, Value>,
}

impl AgentParser {
    pub fn new(application: Map<String, Value>) -> Self {
        let mut parser = Self { application };
        parser.apply_exceptions();
        parser
    }

    fn apply_exceptions(&mut self) {
        let app = &mut self.application;

        // The full-size screenshot doubles as thumbnail.
        if !has(app, "thumbnail_url") {
            if let Some(url) = app.get("screenshot_url").cloned() {
                app.insert("thumbnail_url".to_string(), url);
            }
        }

        // First line of the description is the summary.
        if let Some(Value::String(description)) = app.get("description").cloned() {
            let mut lines = description.lines();
            let comment = lines.next().unwrap_or("").trim().to_string();
            let rest = lines.collect::<Vec<_>>().join("\n").trim().to_string();
            app.insert("Comment".to_string(), Value::String(comment));
            app.insert("Description".to_string(), Value::String(rest));
        }

        // debtags arrive as a list; tags are read as a comma list.
        let tags = match app.get("debtags") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(","),
            _ => String::new(),
        };
        app.insert("Tags".to_string(), Value::String(tags));

        // Only a single video is supported.
        if let Some(Value::Array(urls)) = app.get("video_embedded_html_urls") {
            if let Some(first) = urls.first().cloned() {
                app.insert("video_embedded_html_url".to_string(), first);
            }
        }

        if !has(app, "channel") && has(app, "price") {
            app.insert(
                "channel".to_string(),
                Value::String(AVAILABLE_FOR_PURCHASE_CHANNEL.to_string()),
            );
        }
    }

    fn department(&self) -> Option<String> {
        match self.application.get("department") {
            Some(Value::Array(items)) => items.last().and_then(|v| v.as_str()).map(str::to_string),
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

fn has(map: &Map<String, Value>, field: &str) -> bool {
    map.get(field).is_some_and(|v| !v.is_null())
}

fn static_value(key: &str) -> Option<&'static str> {
    STATIC_DATA.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

impl AppInfoParser for AgentParser {
    fn get_desktop(&self, key: &str, _translated: bool) -> Result<String, ParseError> {
        if let Some(v) = static_value(key) {
            return Ok(v.to_string());
        }
        self.application
            .get(apply_mapping(MAPPING, key))
            .and_then(json_value_to_string)
            .ok_or_else(|| ParseError::MissingKey(key.to_string()))
    }

    fn has_option_desktop(&self, key: &str) -> bool {
        static_value(key).is_some() || has(&self.application, apply_mapping(MAPPING, key))
    }

    fn desktopf(&self) -> String {
        AGENT_ORIGIN.to_string()
    }

    fn get_desktop_categories(&self) -> Vec<String> {
        let mut categories = Vec::new();
        if let Some(department) = self.department() {
            categories.push(format!("DEPARTMENT:{}", department));
        }
        categories.extend(self.get_desktop_list("Categories", ';'));
        categories
    }
}

/// A purchased subscription. Subscription fields shadow application fields.
pub struct PurchasedParser {
    subscription: Map<String, Value>,
    application: AgentParser,
}

impl PurchasedParser {
    /// `distro_codename` rewrites the deb line's distribution, keeping any
    /// pocket suffix (`natty-updates` -> `<codename>-updates`).
    pub fn new(
        mut subscription: Map<String, Value>,
        distro_codename: Option<&str>,
    ) -> Result<Self, ParseError> {
        let application = match subscription.remove("application") {
            Some(Value::Object(app)) => app,
            _ => {
                return Err(ParseError::Malformed {
                    origin: AGENT_ORIGIN.to_string(),
                    message: "subscription without application object".to_string(),
                })
            }
        };
        let mut application = AgentParser::new(application);

        let app = &mut application.application;
        app.insert(
            "channel".to_string(),
            Value::String(PURCHASED_NEEDS_REINSTALL_CHANNEL.to_string()),
        );
        if let Some(Value::String(deb_line)) = subscription.get("deb_line") {
            let rewritten = match distro_codename {
                Some(codename) => update_debline(deb_line, codename),
                None => deb_line.clone(),
            };
            subscription.insert("deb_line".to_string(), Value::String(rewritten));
        }

        Ok(Self {
            subscription,
            application,
        })
    }

    fn subscription_has(&self, key: &str) -> bool {
        has(&self.subscription, apply_mapping(MAPPING, key))
    }
}

impl AppInfoParser for PurchasedParser {
    fn get_desktop(&self, key: &str, translated: bool) -> Result<String, ParseError> {
        if self.subscription_has(key) {
            if let Some(v) = self
                .subscription
                .get(apply_mapping(MAPPING, key))
                .and_then(json_value_to_string)
            {
                return Ok(v);
            }
        }
        self.application.get_desktop(key, translated)
    }

    fn has_option_desktop(&self, key: &str) -> bool {
        self.subscription_has(key) || self.application.has_option_desktop(key)
    }

    fn desktopf(&self) -> String {
        self.application.desktopf()
    }

    fn get_desktop_categories(&self) -> Vec<String> {
        self.application.get_desktop_categories()
    }
}

/// Replace the distribution of a `deb` source line, keeping the pocket.
pub fn update_debline(debline: &str, codename: &str) -> String {
    let mut tokens: Vec<String> = debline.split_whitespace().map(str::to_string).collect();
    let mut idx = 0;
    if tokens
        .first()
        .is_some_and(|t| t == "deb" || t == "deb-src")
    {
        idx += 1;
    }
    if tokens.get(idx).is_some_and(|t| t.starts_with('[')) {
        while idx < tokens.len() && !tokens[idx].ends_with(']') {
            idx += 1;
        }
        idx += 1;
    }
    // Skip the URI.
    idx += 1;
    if let Some(dist) = tokens.get_mut(idx) {
        let mut parts = split_list(dist, '-');
        if parts.is_empty() {
            return debline.to_string();
        }
        parts[0] = codename.to_string();
        *dist = parts.join("-");
    }
    tokens.join(" ")
}
