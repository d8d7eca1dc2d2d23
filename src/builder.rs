//! Turns one normalized parser into one index document.
//!
//! The field mapping is a fixed table of "if the record has key K, set
//! value V / add term T" rules plus a few derived values: the cataloged time comes from the
//! persisted table or the publish date, and icons fall back to a
//! package-prefixed name derived from the icon URL.
//!
//! A record is either built, skipped (ignore flag, architecture, region) or
//! fails with a [`ParseError`]. None of these abort the batch.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::cataloged::CatalogedTimes;
use crate::models::{IndexDocument, TextField, ValueSlot};
use crate::packages::PackageInfo;
use crate::parsers::{split_list, AppInfoParser, ParseError};
use crate::terms::TermGenerator;

pub const REGION_BLACKLIST_TAG: &str = "blacklist-iso3166::country:";
pub const REGION_WHITELIST_TAG: &str = "whitelist-iso3166::country:";

const NAME_KEYS: [&str; 2] = ["X-Ubuntu-Software-Center-Name", "Name"];
const ICON_EXTENSIONS: [&str; 3] = [".png", ".svg", ".xpm"];
const DATE_PUBLISHED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Why a record produced no document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Ignored,
    Architecture(String),
    Region(String),
}

#[derive(Debug)]
pub enum BuildOutcome {
    Document(Box<IndexDocument>),
    Skipped(SkipReason),
}

/// Host facts the builder filters against.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub native_arch: String,
    pub foreign_archs: Vec<String>,
    /// Lowercase ISO-3166 country code.
    pub region: Option<String>,
}

pub struct DocumentBuilder<'a> {
    packages: &'a dyn PackageInfo,
    cataloged_times: &'a CatalogedTimes,
    system: SystemInfo,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(
        packages: &'a dyn PackageInfo,
        cataloged_times: &'a CatalogedTimes,
        mut system: SystemInfo,
    ) -> Self {
        system.region = system.region.map(|r| r.to_lowercase());
        Self {
            packages,
            cataloged_times,
            system,
        }
    }

    pub fn build(&self, parser: &dyn AppInfoParser) -> Result<BuildOutcome, ParseError> {
        if parser.has_option_desktop("X-AppInstall-Ignore") {
            let ignore = parser.get_desktop("X-AppInstall-Ignore", false)?;
            if ignore.trim().eq_ignore_ascii_case("true") {
                return Ok(BuildOutcome::Skipped(SkipReason::Ignored));
            }
        }

        let arch_suffix = match self.arch_suffix(parser)? {
            Ok(suffix) => suffix,
            Err(skip) => return Ok(BuildOutcome::Skipped(skip)),
        };

        if let Some(skip) = self.region_blacklisted(parser)? {
            return Ok(BuildOutcome::Skipped(skip));
        }

        let name_key = NAME_KEYS
            .iter()
            .copied()
            .find(|k| parser.has_option_desktop(k))
            .ok_or_else(|| ParseError::MissingKey("Name".to_string()))?;
        let name = parser.get_desktop(name_key, true)?;
        let untranslated_name = parser.get_desktop(name_key, false)?;

        let bare_pkgname = parser.get_desktop("X-AppInstall-Package", false)?;
        let bare_pkgname = bare_pkgname.trim();
        if bare_pkgname.is_empty() {
            return Err(ParseError::MissingKey("X-AppInstall-Package".to_string()));
        }
        let pkgname = match &arch_suffix {
            Some(arch) => format!("{}:{}", bare_pkgname, arch),
            None => bare_pkgname.to_string(),
        };

        let mut doc = IndexDocument::new(name.clone());
        doc.add_value(ValueSlot::AppName, name.clone());
        doc.add_value(ValueSlot::AppNameUntranslated, untranslated_name);
        doc.add_term(format!("AA{}", name));
        doc.add_term(format!("AP{}", pkgname));
        doc.add_value(ValueSlot::PkgName, pkgname.clone());
        doc.add_value(ValueSlot::DesktopFile, parser.desktopf());
        if let Some(arch) = &arch_suffix {
            doc.add_value(ValueSlot::ArchiveArch, arch.clone());
        }

        if let Some(t) = self.cataloged_times.get(&pkgname) {
            doc.add_number(ValueSlot::CatalogedTime, t);
        }

        self.map_archive_values(parser, &pkgname, &mut doc)?;
        self.map_media_values(parser, &pkgname, &mut doc)?;
        self.map_desktop_values(parser, &mut doc)?;
        if let Some(skip) = self.map_tags(parser, &mut doc)? {
            return Ok(BuildOutcome::Skipped(skip));
        }

        if parser.has_option_desktop("X-AppInstall-Popcon") {
            let raw = parser.get_desktop("X-AppInstall-Popcon", false)?;
            let popcon: f64 = raw.trim().parse().map_err(|_| ParseError::Malformed {
                origin: parser.desktopf(),
                message: format!("popcon '{}' is not a number", raw),
            })?;
            doc.add_number(ValueSlot::Popcon, popcon);
        }

        let candidate = self.packages.candidate(&pkgname);
        let summary = if parser.has_option_desktop("Comment") {
            Some(parser.get_desktop("Comment", true)?)
        } else if parser.has_option_desktop("GenericName") {
            Some(parser.get_desktop("GenericName", true)?)
        } else {
            candidate.map(|c| c.summary.clone())
        };
        match summary.filter(|s| !s.is_empty()) {
            Some(s) => doc.add_value(ValueSlot::Summary, s),
            None => debug!(package = %pkgname, "No summary"),
        }

        let keywords = ["Keywords", "X-AppInstall-Keywords"]
            .iter()
            .find(|k| parser.has_option_desktop(k))
            .map(|k| parser.get_desktop(k, true))
            .transpose()?;

        let mut texts: Vec<(TextField, String)> = vec![(TextField::Name, name), (TextField::PkgName, pkgname.clone())];
        for (field, key) in [
            (TextField::GenericName, "GenericName"),
            (TextField::Comment, "Comment"),
            (TextField::Description, "X-AppInstall-Description"),
        ] {
            if parser.has_option_desktop(key) {
                texts.push((field, parser.get_desktop(key, true)?));
            }
        }
        if let Some(keywords) = keywords {
            for kw in split_list(&keywords, ';') {
                texts.push((TextField::Keywords, kw));
            }
        }

        if let Some(c) = candidate {
            texts.push((TextField::AptSummary, c.summary.clone()));
            texts.push((TextField::AptDescription, c.description.clone()));
            if let Some(section) = &c.section {
                doc.add_term(format!("AE{}", section));
            }
            for origin in &c.origins {
                doc.add_term(format!("XOA{}", origin.archive));
                doc.add_term(format!("XOC{}", origin.component));
                doc.add_term(format!("XOL{}", origin.label));
                doc.add_term(format!("XOO{}", origin.origin));
                doc.add_term(format!("XOS{}", origin.site));
            }
        }

        let mut tg = TermGenerator::new(&mut doc);
        for (field, text) in &texts {
            tg.index_text(*field, text);
        }

        Ok(BuildOutcome::Document(Box::new(doc)))
    }

    /// `Ok(Ok(None))`: native; `Ok(Ok(Some(arch)))`: foreign arch suffix;
    /// `Ok(Err(_))`: not installable here.
    fn arch_suffix(
        &self,
        parser: &dyn AppInfoParser,
    ) -> Result<Result<Option<String>, SkipReason>, ParseError> {
        if !parser.has_option_desktop("X-AppInstall-Architectures") {
            return Ok(Ok(None));
        }
        let raw = parser.get_desktop("X-AppInstall-Architectures", false)?;
        let arches = split_list(&raw, ',');
        if arches.is_empty() || arches.iter().any(|a| a == "all" || *a == self.system.native_arch) {
            return Ok(Ok(None));
        }
        if let Some(foreign) = self
            .system
            .foreign_archs
            .iter()
            .find(|f| arches.contains(f))
        {
            return Ok(Ok(Some(foreign.clone())));
        }
        Ok(Err(SkipReason::Architecture(raw)))
    }

    fn region_blacklisted(
        &self,
        parser: &dyn AppInfoParser,
    ) -> Result<Option<SkipReason>, ParseError> {
        let Some(region) = &self.system.region else {
            return Ok(None);
        };
        if !parser.has_option_desktop("X-AppInstall-Region-Blacklist") {
            return Ok(None);
        }
        let raw = parser.get_desktop("X-AppInstall-Region-Blacklist", false)?;
        if split_list(&raw, ',')
            .iter()
            .any(|r| r.eq_ignore_ascii_case(region))
        {
            return Ok(Some(SkipReason::Region(region.clone())));
        }
        Ok(None)
    }

    fn map_archive_values(
        &self,
        parser: &dyn AppInfoParser,
        pkgname: &str,
        doc: &mut IndexDocument,
    ) -> Result<(), ParseError> {
        if parser.has_option_desktop("X-AppInstall-Section") {
            let section = parser.get_desktop("X-AppInstall-Section", false)?;
            doc.add_term(format!("AS{}", section));
            doc.add_value(ValueSlot::ArchiveSection, section);
        }
        if parser.has_option_desktop("X-AppInstall-Channel") {
            let channel = parser.get_desktop("X-AppInstall-Channel", false)?;
            doc.add_term(format!("AH{}", channel));
            doc.add_value(ValueSlot::ArchiveChannel, channel);
        }

        let simple = [
            ("X-AppInstall-Signing-Key-Id", ValueSlot::ArchiveSigningKeyId),
            ("X-AppInstall-License", ValueSlot::License),
            ("X-AppInstall-Purchased-Date", ValueSlot::PurchasedDate),
            ("X-AppInstall-Deb-Line", ValueSlot::ArchiveDebLine),
            ("X-AppInstall-License-Key", ValueSlot::LicenseKey),
            ("X-AppInstall-License-Key-Path", ValueSlot::LicenseKeyPath),
            ("X-AppInstall-Support-Url", ValueSlot::SupportSiteUrl),
            ("X-AppInstall-Version", ValueSlot::VersionInfo),
        ];
        for (key, slot) in simple {
            if parser.has_option_desktop(key) {
                doc.add_value(slot, parser.get_desktop(key, false)?);
            }
        }

        if parser.has_option_desktop("X-AppInstall-Date-Published") {
            let raw = parser.get_desktop("X-AppInstall-Date-Published", false)?;
            // Sub-seconds are dropped.
            let trimmed = raw.split('.').next().unwrap_or("").trim();
            match NaiveDateTime::parse_from_str(trimmed, DATE_PUBLISHED_FORMAT) {
                Ok(published) => {
                    doc.add_value(ValueSlot::DatePublished, trimmed);
                    doc.add_number(
                        ValueSlot::CatalogedTime,
                        published.and_utc().timestamp() as f64,
                    );
                }
                Err(_) => debug!(package = %pkgname, date = %raw, "Ignoring unparsable publish date"),
            }
        }

        if parser.has_option_desktop("X-AppInstall-PPA") {
            let ppa = parser.get_desktop("X-AppInstall-PPA", false)?;
            if !ppa.is_empty() {
                // Origin term so the PPA is findable before it is enabled.
                doc.add_term(format!("XOOlp-ppa-{}", ppa.replace('/', "-")));
                doc.add_value(ValueSlot::ArchivePpa, ppa);
            }
        }

        if parser.has_option_desktop("X-AppInstall-Price") {
            doc.add_value(ValueSlot::Price, parser.get_desktop("X-AppInstall-Price", false)?);
            doc.add_value(ValueSlot::ArchiveSection, "commercial");
        }
        Ok(())
    }

    fn map_media_values(
        &self,
        parser: &dyn AppInfoParser,
        pkgname: &str,
        doc: &mut IndexDocument,
    ) -> Result<(), ParseError> {
        for (key, slot) in [
            ("X-AppInstall-Screenshot-Url", ValueSlot::ScreenshotUrls),
            ("X-AppInstall-Thumbnail-Url", ValueSlot::ThumbnailUrl),
            ("X-AppInstall-Video-Url", ValueSlot::VideoUrl),
        ] {
            if parser.has_option_desktop(key) {
                doc.add_value(slot, parser.get_desktop(key, false)?);
            }
        }

        if parser.has_option_desktop("X-AppInstall-Icon-Url") {
            let url = parser.get_desktop("X-AppInstall-Icon-Url", false)?;
            if !parser.has_option_desktop("Icon") {
                let basename = url.rsplit('/').next().unwrap_or(&url);
                // Prefixed to avoid clashes between packages.
                doc.add_value(ValueSlot::Icon, format!("{}-icon-{}", pkgname, basename));
                doc.add_value(ValueSlot::IconNeedsDownload, "1");
            }
            doc.add_value(ValueSlot::IconUrl, url);
        }

        if parser.has_option_desktop("Icon") {
            let icon = parser.get_desktop("Icon", false)?;
            let icon = ICON_EXTENSIONS
                .iter()
                .find_map(|ext| icon.strip_suffix(ext))
                .unwrap_or(&icon)
                .to_string();
            doc.add_value(ValueSlot::Icon, icon);
        }
        Ok(())
    }

    fn map_desktop_values(
        &self,
        parser: &dyn AppInfoParser,
        doc: &mut IndexDocument,
    ) -> Result<(), ParseError> {
        let categories = parser.get_desktop_categories();
        for cat in &categories {
            doc.add_term(format!("AC{}", cat.to_lowercase()));
        }
        doc.add_value(ValueSlot::Categories, categories.join(";"));

        for mime in parser.get_desktop_mimetypes() {
            doc.add_term(format!("AM{}", mime.to_lowercase()));
        }

        if parser.has_option_desktop("Type") {
            let app_type = parser.get_desktop("Type", false)?;
            doc.add_term(format!("AT{}", app_type.to_lowercase()));
        }

        let domain = ["X-Ubuntu-Gettext-Domain", "X-GNOME-Gettext-Domain"]
            .iter()
            .find(|k| parser.has_option_desktop(k))
            .map(|k| parser.get_desktop(k, false))
            .transpose()?;
        if let Some(domain) = domain.filter(|d| !d.is_empty()) {
            doc.add_value(ValueSlot::GettextDomain, domain);
        }

        if parser.has_option_desktop("X-AppInstall-Description") {
            doc.add_value(
                ValueSlot::ScDescription,
                parser.get_desktop("X-AppInstall-Description", true)?,
            );
        }

        if parser.has_option_desktop("Supported-Distros")
            || parser.has_option_desktop("X-AppInstall-Supported-Distros")
        {
            let key = if parser.has_option_desktop("Supported-Distros") {
                "Supported-Distros"
            } else {
                "X-AppInstall-Supported-Distros"
            };
            let raw = parser.get_desktop(key, false)?;
            let json = match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(v) if v.is_object() => raw,
                _ => serde_json::Value::String(raw).to_string(),
            };
            doc.add_value(ValueSlot::ScSupportedDistros, json);
        }
        Ok(())
    }

    /// Register `XT` tag terms and enforce region black/whitelist tags.
    fn map_tags(
        &self,
        parser: &dyn AppInfoParser,
        doc: &mut IndexDocument,
    ) -> Result<Option<SkipReason>, ParseError> {
        if !parser.has_option_desktop("X-AppInstall-Tags") {
            return Ok(None);
        }
        let raw = parser.get_desktop("X-AppInstall-Tags", false)?;
        let tags: Vec<String> = split_list(&raw, ',')
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect();
        for tag in &tags {
            doc.add_term(format!("XT{}", tag));
        }

        let Some(region) = &self.system.region else {
            return Ok(None);
        };
        let blacklist: Vec<&str> = tags
            .iter()
            .filter_map(|t| t.strip_prefix(REGION_BLACKLIST_TAG))
            .collect();
        if blacklist.contains(&region.as_str()) {
            return Ok(Some(SkipReason::Region(region.clone())));
        }
        let whitelist: Vec<&str> = tags
            .iter()
            .filter_map(|t| t.strip_prefix(REGION_WHITELIST_TAG))
            .collect();
        if !whitelist.is_empty() && !whitelist.contains(&region.as_str()) {
            return Ok(Some(SkipReason::Region(region.clone())));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Translations;
    use crate::models::IndexValue;
    use crate::packages::{AptPackageCache, PackageCandidate, PackageOrigin};
    use crate::parsers::agent::AgentParser;
    use crate::parsers::desktop::DesktopParser;

    fn system() -> SystemInfo {
        SystemInfo {
            native_arch: "amd64".to_string(),
            foreign_archs: vec!["i386".to_string()],
            region: None,
        }
    }

    fn desktop(content: &str) -> DesktopParser {
        DesktopParser::parse(content, "test.desktop", Translations::untranslated()).unwrap()
    }

    fn cache() -> AptPackageCache {
        let mut cache = AptPackageCache::new();
        cache.insert(PackageCandidate {
            name: "gimp".to_string(),
            version: "2.8.0-1".to_string(),
            section: Some("graphics".to_string()),
            summary: "GIMP, the GNU Image Manipulation Program".to_string(),
            description: "Photo retouching and image composition.".to_string(),
            origins: vec![PackageOrigin {
                archive: "precise".to_string(),
                component: "main".to_string(),
                label: "Ubuntu".to_string(),
                origin: "Ubuntu".to_string(),
                site: "archive.ubuntu.com".to_string(),
            }],
        });
        cache
    }

    fn build_one(
        builder: &mut DocumentBuilder<'_>,
        parser: &dyn AppInfoParser,
    ) -> IndexDocument {
        match builder.build(parser).unwrap() {
            BuildOutcome::Document(doc) => *doc,
            BuildOutcome::Skipped(reason) => panic!("unexpected skip: {:?}", reason),
        }
    }

    #[test]
    fn desktop_entry_maps_to_values_and_terms() {
        let cache = cache();
        let times: CatalogedTimes = [("gimp".to_string(), 1_000.0)].into_iter().collect();
        let mut builder = DocumentBuilder::new(&cache, &times, system());
        let doc = build_one(
            &mut builder,
            &desktop(
                "[Desktop Entry]\nName=GIMP\nX-AppInstall-Package=gimp\nX-AppInstall-Section=main\n\
                 Icon=gimp.png\nCategories=Graphics;2DGraphics;\nMimeType=image/PNG;\nType=Application\n\
                 Keywords=paint;draw;\nX-AppInstall-Popcon=12.5\n",
            ),
        );
        assert_eq!(doc.data, "GIMP");
        assert_eq!(doc.pkgname(), Some("gimp"));
        assert_eq!(doc.text_value(ValueSlot::Icon), Some("gimp"));
        assert_eq!(doc.text_value(ValueSlot::ArchiveSection), Some("main"));
        assert_eq!(doc.text_value(ValueSlot::Categories), Some("Graphics;2DGraphics"));
        assert_eq!(doc.value(ValueSlot::CatalogedTime), Some(&IndexValue::Number(1_000.0)));
        // No Comment or GenericName: summary comes from the package.
        assert_eq!(
            doc.text_value(ValueSlot::Summary),
            Some("GIMP, the GNU Image Manipulation Program")
        );
        for term in [
            "APgimp", "AAGIMP", "ASmain", "AEgraphics", "ACgraphics", "AC2dgraphics",
            "AMimage/png", "ATapplication", "XOAprecise", "XOCmain", "XOSarchive.ubuntu.com",
        ] {
            assert!(doc.has_term(term), "missing term {}", term);
        }
        assert_eq!(doc.postings["gimp"], 10 + 8 + 5);
        assert_eq!(doc.postings["paint"], 5);
        assert_eq!(doc.value(ValueSlot::Popcon), Some(&IndexValue::Number(12.5)));
    }

    #[test]
    fn record_without_any_name_fails() {
        let cache = AptPackageCache::new();
        let times = CatalogedTimes::empty();
        let mut builder = DocumentBuilder::new(&cache, &times, system());
        let err = builder
            .build(&desktop("[Desktop Entry]\nX-AppInstall-Package=nameless\n"))
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingKey(_)));
    }

    #[test]
    fn software_center_name_alias_is_preferred() {
        let cache = AptPackageCache::new();
        let times = CatalogedTimes::empty();
        let mut builder = DocumentBuilder::new(&cache, &times, system());
        let doc = build_one(
            &mut builder,
            &desktop(
                "[Desktop Entry]\nX-Ubuntu-Software-Center-Name=Nice Name\nName=ugly\nX-AppInstall-Package=x\n",
            ),
        );
        assert_eq!(doc.data, "Nice Name");
    }

    #[test]
    fn ignore_flag_skips() {
        let cache = AptPackageCache::new();
        let times = CatalogedTimes::empty();
        let mut builder = DocumentBuilder::new(&cache, &times, system());
        let outcome = builder
            .build(&desktop(
                "[Desktop Entry]\nName=x\nX-AppInstall-Package=x\nX-AppInstall-Ignore=True\n",
            ))
            .unwrap();
        assert!(matches!(outcome, BuildOutcome::Skipped(SkipReason::Ignored)));
    }

    #[test]
    fn architecture_rules() {
        let cache = AptPackageCache::new();
        let times = CatalogedTimes::empty();
        let mut builder = DocumentBuilder::new(&cache, &times, system());

        let native = build_one(
            &mut builder,
            &desktop("[Desktop Entry]\nName=x\nX-AppInstall-Package=skype\nX-AppInstall-Architectures=amd64,i386\n"),
        );
        assert_eq!(native.pkgname(), Some("skype"));
        assert!(native.has_term("APskype"));

        let foreign = build_one(
            &mut builder,
            &desktop("[Desktop Entry]\nName=x\nX-AppInstall-Package=skype\nX-AppInstall-Architectures=i386\n"),
        );
        assert_eq!(foreign.pkgname(), Some("skype:i386"));
        assert!(foreign.has_term("APskype:i386"));
        assert_eq!(foreign.text_value(ValueSlot::ArchiveArch), Some("i386"));

        let outcome = builder
            .build(&desktop(
                "[Desktop Entry]\nName=x\nX-AppInstall-Package=y\nX-AppInstall-Architectures=armhf\n",
            ))
            .unwrap();
        assert!(matches!(outcome, BuildOutcome::Skipped(SkipReason::Architecture(_))));
    }

    #[test]
    fn region_blacklist_skips() {
        let cache = AptPackageCache::new();
        let times = CatalogedTimes::empty();
        let mut sys = system();
        sys.region = Some("GB".to_string());
        let mut builder = DocumentBuilder::new(&cache, &times, sys);

        let outcome = builder
            .build(&desktop(
                "[Desktop Entry]\nName=x\nX-AppInstall-Package=x\nX-AppInstall-Region-Blacklist=us,gb\n",
            ))
            .unwrap();
        assert_eq!(
            format!("{:?}", outcome),
            format!("{:?}", BuildOutcome::Skipped(SkipReason::Region("gb".to_string())))
        );

        let outcome = builder
            .build(&desktop(
                "[Desktop Entry]\nName=x\nX-AppInstall-Package=x\nX-AppInstall-Tags=whitelist-iso3166::country:us\n",
            ))
            .unwrap();
        assert!(matches!(outcome, BuildOutcome::Skipped(SkipReason::Region(_))));

        let doc = build_one(
            &mut builder,
            &desktop(
                "[Desktop Entry]\nName=x\nX-AppInstall-Package=x\nX-AppInstall-Tags=whitelist-iso3166::country:gb,hardware::printer\n",
            ),
        );
        assert!(doc.has_term("XThardware::printer"));
    }

    #[test]
    fn popcon_is_a_numeric_value() {
        let cache = AptPackageCache::new();
        let times = CatalogedTimes::empty();
        let mut builder = DocumentBuilder::new(&cache, &times, system());
        let doc = build_one(
            &mut builder,
            &desktop("[Desktop Entry]\nName=app\nX-AppInstall-Package=pkg\nX-AppInstall-Popcon= 5.2\n"),
        );
        assert_eq!(doc.value(ValueSlot::Popcon).and_then(|v| v.as_number()), Some(5.2));
    }

    #[test]
    fn agent_record_gets_commercial_values() {
        let cache = AptPackageCache::new();
        let times: CatalogedTimes = [("photobomb".to_string(), 1.0)].into_iter().collect();
        let mut builder = DocumentBuilder::new(&cache, &times, system());
        let app = serde_json::json!({
            "name": "Photobomb",
            "package_name": "photobomb",
            "price": "2.99",
            "archive_id": "commercial-ppa-uploaders/photobomb",
            "icon_url": "http://example.com/icons/photobomb.png",
            "date_published": "2011-12-05 18:43:21.653868",
            "description": "Easy image editing\nLonger text.",
        });
        let serde_json::Value::Object(map) = app else { unreachable!() };
        let doc = build_one(&mut builder, &AgentParser::new(map));

        assert_eq!(doc.text_value(ValueSlot::Price), Some("2.99"));
        assert_eq!(doc.text_value(ValueSlot::ArchiveSection), Some("commercial"));
        assert_eq!(
            doc.text_value(ValueSlot::Icon),
            Some("photobomb-icon-photobomb.png")
        );
        assert_eq!(doc.text_value(ValueSlot::DatePublished), Some("2011-12-05 18:43:21"));
        // The publish date overrides the cataloged-time table.
        assert_eq!(
            doc.value(ValueSlot::CatalogedTime).and_then(|v| v.as_number()),
            Some(1_323_110_601.0)
        );
        assert!(doc.has_term("XOOlp-ppa-commercial-ppa-uploaders-photobomb"));
        assert_eq!(doc.text_value(ValueSlot::Summary), Some("Easy image editing"));
        assert_eq!(doc.text_value(ValueSlot::ScDescription), Some("Longer text."));
    }

    #[test]
    fn bad_popcon_fails_record() {
        let cache = AptPackageCache::new();
        let times = CatalogedTimes::empty();
        let mut builder = DocumentBuilder::new(&cache, &times, system());
        let err = builder
            .build(&desktop(
                "[Desktop Entry]\nName=x\nX-AppInstall-Package=x\nX-AppInstall-Popcon=lots\n",
            ))
            .unwrap_err();
        assert!(matches!(err, ParseError::Malformed { .. }));
    }
}
