use anyhow::Result;
use std::path::Path;

use crate::config::Config;

/// Kind of metadata source, in rebuild order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Desktop,
    AppStream,
    AptLists,
    Json,
    AgentAvailable,
    AgentPurchased,
}

/// One configured source. `location` is a path, or a URL for remote
/// payloads.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
    pub location: String,
}

impl Source {
    pub fn is_remote(&self) -> bool {
        is_url(&self.location)
    }
}

pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Every configured source, in the order a rebuild processes them.
pub fn configured_sources(config: &Config) -> Vec<Source> {
    let s = &config.sources;
    let mut sources = Vec::new();

    if let Some(desktop) = &s.desktop {
        sources.push(Source {
            name: "desktop".to_string(),
            kind: SourceKind::Desktop,
            location: desktop.dir.display().to_string(),
        });
    }
    if let Some(appstream) = &s.appstream {
        sources.push(Source {
            name: "appstream".to_string(),
            kind: SourceKind::AppStream,
            location: appstream.path.display().to_string(),
        });
    }
    if let Some(apt) = &s.apt_lists {
        sources.push(Source {
            name: "apt-lists".to_string(),
            kind: SourceKind::AptLists,
            location: apt.dir.display().to_string(),
        });
    }
    for json in &s.json {
        let location = match (&json.path, &json.url) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(url)) => url.clone(),
            (None, None) => continue,
        };
        sources.push(Source {
            name: format!("json:{}", json.origin),
            kind: SourceKind::Json,
            location,
        });
    }
    if let Some(agent) = &s.agent {
        if let Some(available) = &agent.available {
            sources.push(Source {
                name: "agent:available".to_string(),
                kind: SourceKind::AgentAvailable,
                location: available.clone(),
            });
        }
        if let Some(purchased) = &agent.purchased {
            sources.push(Source {
                name: "agent:purchased".to_string(),
                kind: SourceKind::AgentPurchased,
                location: purchased.clone(),
            });
        }
    }
    sources
}

pub fn list_sources(config: &Config) -> Result<()> {
    let sources = configured_sources(config);

    println!("{:<24} {:<10} {:<8} LOCATION", "SOURCE", "STATUS", "HEALTHY");
    if sources.is_empty() {
        println!("(no sources configured)");
        return Ok(());
    }
    for source in &sources {
        let (status, healthy) = if source.is_remote() {
            ("REMOTE", true)
        } else if Path::new(&source.location).exists() {
            ("OK", true)
        } else {
            ("MISSING", false)
        };
        println!(
            "{:<24} {:<10} {:<8} {}",
            source.name, status, healthy, source.location
        );
    }

    Ok(())
}
