//! TOML configuration for the index builder.
//!
//! Every source section is optional. A missing section means the source is
//! not configured and contributes nothing to a rebuild.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::DB_SCHEMA_VERSION;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub packages: PackagesConfig,
    #[serde(default)]
    pub cataloged_times: Option<CatalogedTimesConfig>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub path: PathBuf,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
}

fn default_schema_version() -> String {
    DB_SCHEMA_VERSION.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    #[serde(default = "default_native_arch")]
    pub native_arch: String,
    #[serde(default)]
    pub foreign_archs: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_locale_dir")]
    pub locale_dir: PathBuf,
    #[serde(default)]
    pub distro_codename: Option<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            native_arch: default_native_arch(),
            foreign_archs: Vec::new(),
            region: None,
            languages: default_languages(),
            locale_dir: default_locale_dir(),
            distro_codename: None,
        }
    }
}

/// Debian architecture name of the running build target.
pub fn default_native_arch() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "powerpc64" => "ppc64el",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        other => other,
    }
    .to_string()
}

fn default_languages() -> Vec<String> {
    crate::i18n::languages_from_env()
}

fn default_locale_dir() -> PathBuf {
    PathBuf::from("/usr/share/locale")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PackagesConfig {
    #[serde(default)]
    pub lists: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogedTimesConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    pub desktop: Option<DesktopSourceConfig>,
    pub appstream: Option<AppStreamSourceConfig>,
    pub apt_lists: Option<AptListsSourceConfig>,
    #[serde(default)]
    pub json: Vec<JsonSourceConfig>,
    pub agent: Option<AgentSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DesktopSourceConfig {
    pub dir: PathBuf,
    #[serde(default = "default_desktop_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_desktop_globs() -> Vec<String> {
    vec!["*.desktop".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppStreamSourceConfig {
    /// A directory of `*.xml` files or a single XML file.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AptListsSourceConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JsonSourceConfig {
    pub origin: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentSourceConfig {
    /// Path or URL of the available-applications payload.
    #[serde(default)]
    pub available: Option<String>,
    /// Path or URL of the purchased-subscriptions payload.
    #[serde(default)]
    pub purchased: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

fn default_log_format() -> String {
    "human".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Config used when no file is present. Only the index path is set.
    pub fn minimal(index_path: PathBuf) -> Self {
        Self {
            index: IndexConfig {
                path: index_path,
                schema_version: default_schema_version(),
            },
            system: SystemConfig::default(),
            packages: PackagesConfig::default(),
            cataloged_times: None,
            sources: SourcesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.index.path.as_os_str().is_empty() {
        anyhow::bail!("index.path must not be empty");
    }

    if config.system.native_arch.trim().is_empty() {
        anyhow::bail!("system.native_arch must not be empty");
    }

    if let Some(region) = &config.system.region {
        if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!(
                "system.region must be a two-letter ISO-3166 country code, got '{}'",
                region
            );
        }
    }

    for (i, src) in config.sources.json.iter().enumerate() {
        match (&src.path, &src.url) {
            (Some(_), None) | (None, Some(_)) => {}
            _ => anyhow::bail!(
                "sources.json[{}] ('{}') must set exactly one of path or url",
                i,
                src.origin
            ),
        }
    }

    if let Some(agent) = &config.sources.agent {
        if agent.timeout_secs == 0 {
            anyhow::bail!("sources.agent.timeout_secs must be > 0");
        }
    }

    match config.logging.format.as_str() {
        "human" | "json" => {}
        other => anyhow::bail!(
            "Unknown logging format: '{}'. Must be human or json.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let cfg = parse("[index]\npath = \"/tmp/idx\"\n").unwrap();
        assert_eq!(cfg.index.schema_version, DB_SCHEMA_VERSION);
        assert!(cfg.sources.desktop.is_none());
        assert!(cfg.sources.json.is_empty());
        assert_eq!(cfg.logging.format, "human");
        assert!(!cfg.system.native_arch.is_empty());
    }

    #[test]
    fn json_source_needs_exactly_one_location() {
        let err = parse(
            r#"
[index]
path = "/tmp/idx"

[[sources.json]]
origin = "feed"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one of path or url"));
    }

    #[test]
    fn rejects_bad_region() {
        let err = parse("[index]\npath = \"/tmp/idx\"\n[system]\nregion = \"usa\"\n").unwrap_err();
        assert!(err.to_string().contains("ISO-3166"));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let err = parse("[index]\npath = \"/tmp/idx\"\n[logging]\nformat = \"xml\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown logging format"));
    }

    #[test]
    fn desktop_source_default_globs() {
        let cfg = parse(
            r#"
[index]
path = "/tmp/idx"

[sources.desktop]
dir = "/usr/share/app-install/desktop"
"#,
        )
        .unwrap();
        let desktop = cfg.sources.desktop.unwrap();
        assert_eq!(desktop.include_globs, vec!["*.desktop".to_string()]);
        assert!(!desktop.follow_symlinks);
    }
}
