//! Core data types of the index: value slots, documents and batch metadata.
//!
//! Slot numbers are part of the on-disk format. Readers look values up by
//! number, so existing slots must never be renumbered.

use std::collections::{BTreeMap, BTreeSet};

/// Version string written to every rebuilt index.
pub const DB_SCHEMA_VERSION: &str = "1";

/// Metadata keys written once per rebuild.
pub const META_SCHEMA_VERSION: &str = "db-schema-version";
pub const META_POPCON_MAX: &str = "popcon_max_desktop";
pub const META_CONTENT_HASH: &str = "content-hash";
pub const META_BUILD_TIME: &str = "build-time";
pub const META_GENERATION: &str = "generation";
pub const META_DOCUMENT_COUNT: &str = "document-count";

/// Channel assigned to purchased applications that must be reinstalled.
pub const PURCHASED_NEEDS_REINSTALL_CHANNEL: &str = "for-pay-needs-reinstall";
/// Channel of applications offered for purchase by the agent.
pub const AVAILABLE_FOR_PURCHASE_CHANNEL: &str = "available-for-pay";

/// Fixed enumeration of document value slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum ValueSlot {
    AppName = 170,
    PkgName = 171,
    Icon = 172,
    GettextDomain = 173,
    ArchiveSection = 174,
    ArchiveArch = 175,
    Popcon = 176,
    Summary = 177,
    ArchiveChannel = 178,
    DesktopFile = 179,
    Price = 180,
    ArchivePpa = 181,
    ArchiveDebLine = 182,
    ArchiveSigningKeyId = 183,
    PurchasedDate = 184,
    ScreenshotUrls = 185,
    IconNeedsDownload = 186,
    ThumbnailUrl = 187,
    ScDescription = 188,
    AppNameUntranslated = 189,
    IconUrl = 190,
    Categories = 191,
    LicenseKey = 192,
    LicenseKeyPath = 193,
    License = 194,
    VideoUrl = 195,
    DatePublished = 196,
    SupportSiteUrl = 197,
    VersionInfo = 198,
    ScSupportedDistros = 199,
    CatalogedTime = 200,
}

impl ValueSlot {
    pub const ALL: [ValueSlot; 31] = [
        ValueSlot::AppName,
        ValueSlot::PkgName,
        ValueSlot::Icon,
        ValueSlot::GettextDomain,
        ValueSlot::ArchiveSection,
        ValueSlot::ArchiveArch,
        ValueSlot::Popcon,
        ValueSlot::Summary,
        ValueSlot::ArchiveChannel,
        ValueSlot::DesktopFile,
        ValueSlot::Price,
        ValueSlot::ArchivePpa,
        ValueSlot::ArchiveDebLine,
        ValueSlot::ArchiveSigningKeyId,
        ValueSlot::PurchasedDate,
        ValueSlot::ScreenshotUrls,
        ValueSlot::IconNeedsDownload,
        ValueSlot::ThumbnailUrl,
        ValueSlot::ScDescription,
        ValueSlot::AppNameUntranslated,
        ValueSlot::IconUrl,
        ValueSlot::Categories,
        ValueSlot::LicenseKey,
        ValueSlot::LicenseKeyPath,
        ValueSlot::License,
        ValueSlot::VideoUrl,
        ValueSlot::DatePublished,
        ValueSlot::SupportSiteUrl,
        ValueSlot::VersionInfo,
        ValueSlot::ScSupportedDistros,
        ValueSlot::CatalogedTime,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|slot| slot.id() == id)
    }

    /// Lowercase name used by `sc-index show`.
    pub fn name(self) -> &'static str {
        match self {
            ValueSlot::AppName => "appname",
            ValueSlot::PkgName => "pkgname",
            ValueSlot::Icon => "icon",
            ValueSlot::GettextDomain => "gettext_domain",
            ValueSlot::ArchiveSection => "archive_section",
            ValueSlot::ArchiveArch => "archive_arch",
            ValueSlot::Popcon => "popcon",
            ValueSlot::Summary => "summary",
            ValueSlot::ArchiveChannel => "archive_channel",
            ValueSlot::DesktopFile => "desktop_file",
            ValueSlot::Price => "price",
            ValueSlot::ArchivePpa => "archive_ppa",
            ValueSlot::ArchiveDebLine => "archive_deb_line",
            ValueSlot::ArchiveSigningKeyId => "archive_signing_key_id",
            ValueSlot::PurchasedDate => "purchased_date",
            ValueSlot::ScreenshotUrls => "screenshot_urls",
            ValueSlot::IconNeedsDownload => "icon_needs_download",
            ValueSlot::ThumbnailUrl => "thumbnail_url",
            ValueSlot::ScDescription => "sc_description",
            ValueSlot::AppNameUntranslated => "appname_untranslated",
            ValueSlot::IconUrl => "icon_url",
            ValueSlot::Categories => "categories",
            ValueSlot::LicenseKey => "license_key",
            ValueSlot::LicenseKeyPath => "license_key_path",
            ValueSlot::License => "license",
            ValueSlot::VideoUrl => "video_url",
            ValueSlot::DatePublished => "date_published",
            ValueSlot::SupportSiteUrl => "support_site_url",
            ValueSlot::VersionInfo => "version_info",
            ValueSlot::ScSupportedDistros => "sc_supported_distros",
            ValueSlot::CatalogedTime => "cataloged_time",
        }
    }
}

/// A value stored in a slot. Numbers sort numerically in the store.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Text(String),
    Number(f64),
}

impl IndexValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            IndexValue::Text(s) => Some(s),
            IndexValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            IndexValue::Number(n) => Some(*n),
            IndexValue::Text(_) => None,
        }
    }
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::Text(s) => write!(f, "{}", s),
            IndexValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Free-text fields kept verbatim for the full-text table.
///
/// Each field maps to one weighted column of the engine's text index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TextField {
    Name,
    PkgName,
    Keywords,
    AptSummary,
    GenericName,
    Comment,
    Description,
    AptDescription,
}

impl TextField {
    pub const ALL: [TextField; 8] = [
        TextField::Name,
        TextField::PkgName,
        TextField::Keywords,
        TextField::AptSummary,
        TextField::GenericName,
        TextField::Comment,
        TextField::Description,
        TextField::AptDescription,
    ];

    /// Relative importance of the field when ranking and counting postings.
    pub fn weight(self) -> u32 {
        match self {
            TextField::Name => 10,
            TextField::PkgName => 8,
            TextField::Keywords => 5,
            TextField::AptSummary => 5,
            TextField::GenericName => 3,
            TextField::Comment => 1,
            TextField::Description => 1,
            TextField::AptDescription => 1,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            TextField::Name => "name",
            TextField::PkgName => "pkgname",
            TextField::Keywords => "keywords",
            TextField::AptSummary => "apt_summary",
            TextField::GenericName => "generic_name",
            TextField::Comment => "comment",
            TextField::Description => "description",
            TextField::AptDescription => "apt_description",
        }
    }
}

/// A field bag produced by the document builder.
#[derive(Debug, Clone, Default)]
pub struct IndexDocument {
    /// Display name of the application.
    pub data: String,
    pub values: BTreeMap<ValueSlot, IndexValue>,
    /// Boolean, prefixed terms (`AP<pkg>`, `AC<category>`, ...).
    pub terms: BTreeSet<String>,
    /// Free-text postings: term to within-document frequency.
    pub postings: BTreeMap<String, u32>,
    /// Raw text per field, joined with newlines when a field repeats.
    pub text: BTreeMap<TextField, String>,
}

impl IndexDocument {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn add_value(&mut self, slot: ValueSlot, value: impl Into<String>) {
        self.values.insert(slot, IndexValue::Text(value.into()));
    }

    pub fn add_number(&mut self, slot: ValueSlot, value: f64) {
        self.values.insert(slot, IndexValue::Number(value));
    }

    pub fn add_term(&mut self, term: impl Into<String>) {
        self.terms.insert(term.into());
    }

    pub fn value(&self, slot: ValueSlot) -> Option<&IndexValue> {
        self.values.get(&slot)
    }

    pub fn text_value(&self, slot: ValueSlot) -> Option<&str> {
        self.values.get(&slot).and_then(|v| v.as_text())
    }

    pub fn pkgname(&self) -> Option<&str> {
        self.text_value(ValueSlot::PkgName)
    }

    pub fn has_term(&self, term: &str) -> bool {
        self.terms.contains(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_ids_round_trip() {
        for slot in ValueSlot::ALL {
            assert_eq!(ValueSlot::from_id(slot.id()), Some(slot));
        }
        assert_eq!(ValueSlot::PkgName.id(), 171);
        assert_eq!(ValueSlot::from_id(42), None);
    }

    #[test]
    fn name_outweighs_description() {
        assert!(TextField::Name.weight() > TextField::PkgName.weight());
        assert!(TextField::PkgName.weight() > TextField::Description.weight());
    }

    #[test]
    fn document_accessors() {
        let mut doc = IndexDocument::new("Gimp");
        doc.add_value(ValueSlot::PkgName, "gimp");
        doc.add_number(ValueSlot::Popcon, 3.5);
        doc.add_term("APgimp");
        assert_eq!(doc.pkgname(), Some("gimp"));
        assert_eq!(doc.value(ValueSlot::Popcon).and_then(|v| v.as_number()), Some(3.5));
        assert!(doc.has_term("APgimp"));
    }
}
