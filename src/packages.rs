//! Read-only package metadata from apt's on-disk lists.
//!
//! The index builder needs, per package name: the candidate version, its
//! summary and long description, the archive section and the origins the
//! candidate is published in. [`AptPackageCache`] reads `Packages` files
//! (and dpkg `status`) with `debian-packaging` and keeps the highest version
//! per package as the candidate. A package that is not found is "metadata
//! unavailable", never an error.

use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use debian_packaging::control::{ControlParagraph, ControlParagraphReader};
use debian_packaging::package_version::PackageVersion;
use tracing::{debug, warn};

/// Where a package candidate comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOrigin {
    pub archive: String,
    pub component: String,
    pub label: String,
    pub origin: String,
    pub site: String,
}

/// Metadata of a package's candidate version.
#[derive(Debug, Clone)]
pub struct PackageCandidate {
    pub name: String,
    pub version: String,
    pub section: Option<String>,
    pub summary: String,
    pub description: String,
    pub origins: Vec<PackageOrigin>,
}

/// External package-information provider, keyed by package name.
pub trait PackageInfo: Send + Sync {
    fn candidate(&self, pkgname: &str) -> Option<&PackageCandidate>;

    fn contains(&self, pkgname: &str) -> bool {
        self.candidate(pkgname).is_some()
    }
}

/// Package cache built from apt list files.
#[derive(Debug, Default)]
pub struct AptPackageCache {
    packages: HashMap<String, (PackageVersion, PackageCandidate)>,
}

impl AptPackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every list file. Unreadable lists are logged and skipped.
    pub fn open(lists: &[impl AsRef<Path>]) -> Self {
        let mut cache = Self::new();
        for list in lists {
            let list = list.as_ref();
            match cache.load_list(list) {
                Ok(n) => debug!(list = %list.display(), packages = n, "Loaded package list"),
                Err(e) => warn!(list = %list.display(), error = %e, "Skipping package list"),
            }
        }
        cache
    }

    /// Read one `Packages`/`status` file. Returns the number of paragraphs read.
    pub fn load_list(&mut self, path: &Path) -> Result<usize> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open package list: {}", path.display()))?;
        let origin = origin_for_list(path);
        let reader = ControlParagraphReader::new(BufReader::new(file));

        let mut count = 0;
        for paragraph in reader {
            let paragraph = paragraph
                .with_context(|| format!("Malformed package list: {}", path.display()))?;
            if let Some(candidate) = candidate_from_paragraph(&paragraph, origin.clone()) {
                self.insert(candidate);
            }
            count += 1;
        }
        Ok(count)
    }

    pub fn insert(&mut self, candidate: PackageCandidate) {
        let version = match PackageVersion::parse(&candidate.version) {
            Ok(v) => v,
            Err(e) => {
                warn!(package = %candidate.name, version = %candidate.version, error = %e, "Ignoring unparsable version");
                return;
            }
        };
        match self.packages.get_mut(&candidate.name) {
            Some((existing, existing_candidate)) => {
                if version > *existing {
                    *existing = version;
                    *existing_candidate = candidate;
                } else if version == *existing {
                    for o in candidate.origins {
                        if !existing_candidate.origins.contains(&o) {
                            existing_candidate.origins.push(o);
                        }
                    }
                }
            }
            None => {
                self.packages
                    .insert(candidate.name.clone(), (version, candidate));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageInfo for AptPackageCache {
    fn candidate(&self, pkgname: &str) -> Option<&PackageCandidate> {
        // Multiarch-qualified names share the metadata of the bare package.
        let bare = pkgname.split(':').next().unwrap_or(pkgname);
        self.packages.get(bare).map(|(_, c)| c)
    }
}

fn candidate_from_paragraph(
    paragraph: &ControlParagraph<'_>,
    origin: Option<PackageOrigin>,
) -> Option<PackageCandidate> {
    let name = paragraph.field_str("Package")?.trim().to_string();
    let version = paragraph.field_str("Version")?.trim().to_string();
    let (summary, description) = split_description(paragraph.field_str("Description").unwrap_or(""));
    let section = paragraph
        .field_str("Section")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(PackageCandidate {
        name,
        version,
        section,
        summary,
        description,
        origins: origin.into_iter().collect(),
    })
}

/// Split a control `Description` into its synopsis and long description.
///
/// Continuation lines lose their leading space, and a lone `.` marks an
/// empty line.
pub fn split_description(raw: &str) -> (String, String) {
    let mut lines = raw.lines();
    let summary = lines.next().unwrap_or("").trim().to_string();
    let body: Vec<&str> = lines
        .map(|l| {
            let l = l.strip_prefix(' ').unwrap_or(l);
            if l.trim() == "." {
                ""
            } else {
                l.trim_end()
            }
        })
        .collect();
    (summary, body.join("\n").trim().to_string())
}

/// Derive origin data from an apt list file name such as
/// `archive.ubuntu.com_ubuntu_dists_precise-updates_main_binary-amd64_Packages`.
///
/// The matching `..._Release` file, when present, supplies `Origin` and
/// `Label`. Lists that do not follow the naming scheme (dpkg `status`) get
/// no origin.
pub fn origin_for_list(path: &Path) -> Option<PackageOrigin> {
    let file_name = path.file_name()?.to_str()?;
    let parts: Vec<&str> = file_name.split('_').collect();
    let dists = parts.iter().position(|p| *p == "dists")?;
    let site = parts.first()?.to_string();
    let archive = parts.get(dists + 1)?.to_string();
    let component = parts
        .get(dists + 2)
        .filter(|c| !c.starts_with("binary-") && **c != "Packages")
        .map(|c| c.to_string())
        .unwrap_or_default();

    let mut origin = PackageOrigin {
        archive,
        component,
        site,
        ..Default::default()
    };

    let release_name = format!("{}_Release", parts[..=dists + 1].join("_"));
    let release = path.with_file_name(release_name);
    if let Ok(file) = std::fs::File::open(&release) {
        let mut reader = ControlParagraphReader::new(BufReader::new(file));
        if let Some(Ok(p)) = reader.next() {
            origin.origin = p.field_str("Origin").unwrap_or("").trim().to_string();
            origin.label = p.field_str("Label").unwrap_or("").trim().to_string();
            if let Some(suite) = p.field_str("Suite") {
                origin.archive = suite.trim().to_string();
            }
        }
    }
    Some(origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PACKAGES: &str = "\
Package: gimp
Version: 2.6.12-1
Section: graphics
Description: GNU Image Manipulation Program
 GIMP is an advanced picture editor.
 .
 It can be used for photo retouching.

Package: gimp
Version: 2.8.0-1
Section: graphics
Description: The GNU Image Manipulation Program
 Newer GIMP.

Package: bzr
Version: 2.5.0-2
Section: vcs
Description: easy to use distributed version control system
";

    fn write_list(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn highest_version_wins() {
        let tmp = TempDir::new().unwrap();
        let list = write_list(tmp.path(), "Packages", PACKAGES);
        let cache = AptPackageCache::open(&[list]);
        assert_eq!(cache.len(), 2);
        let gimp = cache.candidate("gimp").unwrap();
        assert_eq!(gimp.version, "2.8.0-1");
        assert_eq!(gimp.summary, "The GNU Image Manipulation Program");
        assert_eq!(gimp.section.as_deref(), Some("graphics"));
    }

    #[test]
    fn multiarch_name_resolves_to_bare_package() {
        let tmp = TempDir::new().unwrap();
        let list = write_list(tmp.path(), "Packages", PACKAGES);
        let cache = AptPackageCache::open(&[list]);
        assert!(cache.contains("bzr:i386"));
        assert!(!cache.contains("emacs"));
    }

    #[test]
    fn missing_list_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let cache = AptPackageCache::open(&[tmp.path().join("nope_Packages")]);
        assert!(cache.is_empty());
    }

    #[test]
    fn description_split() {
        let (summary, body) =
            split_description("editor\n First line.\n .\n Second paragraph.");
        assert_eq!(summary, "editor");
        assert_eq!(body, "First line.\n\nSecond paragraph.");
    }

    #[test]
    fn origin_from_list_name_and_release() {
        let tmp = TempDir::new().unwrap();
        write_list(
            tmp.path(),
            "archive.ubuntu.com_ubuntu_dists_precise_Release",
            "Origin: Ubuntu\nLabel: Ubuntu\nSuite: precise\n",
        );
        let list = write_list(
            tmp.path(),
            "archive.ubuntu.com_ubuntu_dists_precise_main_binary-amd64_Packages",
            PACKAGES,
        );
        let origin = origin_for_list(&list).unwrap();
        assert_eq!(origin.site, "archive.ubuntu.com");
        assert_eq!(origin.archive, "precise");
        assert_eq!(origin.component, "main");
        assert_eq!(origin.origin, "Ubuntu");
        assert_eq!(origin.label, "Ubuntu");

        let cache = AptPackageCache::open(&[list]);
        assert_eq!(cache.candidate("bzr").unwrap().origins, vec![origin]);
    }

    #[test]
    fn status_file_has_no_origin() {
        assert!(origin_for_list(Path::new("/var/lib/dpkg/status")).is_none());
    }
}
