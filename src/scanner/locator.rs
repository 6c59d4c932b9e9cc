//! Bundle lookup: resolve an application name to its primary bundle and
//! canonical identifier.
//!
//! Install roots are probed in order (system-wide first, then per-user). For
//! each root the canonical `<name><suffix>` bundle is tried before a bare
//! `<name>` directory, and the first hit ends the search. Nothing here ever
//! fails: "not installed" and "manifest unreadable" are ordinary outcomes.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::{Result, SweepError};
use crate::core::paths::home_relative;
use crate::scanner::manifest::{self, ManifestError};
use crate::scanner::walker::{Artifact, ArtifactKind};

/// A validated application name with the bundle suffix stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    /// Normalize raw user input.
    ///
    /// Trims whitespace and strips `suffix` (ASCII case-insensitive). Rejects
    /// input that is empty afterwards, `.`/`..`, or contains `/` or NUL: an
    /// empty name would match every entry in every library root.
    pub fn parse(raw: &str, suffix: &str) -> Result<Self> {
        let mut name = raw.trim();
        if !suffix.is_empty()
            && name.len() >= suffix.len()
            && name.is_char_boundary(name.len() - suffix.len())
            && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
        {
            name = name[..name.len() - suffix.len()].trim_end();
        }

        if name.is_empty() || name == "." || name == ".." {
            return Err(SweepError::InvalidArgument {
                details: format!("application name {raw:?} is empty after normalization"),
            });
        }
        if name.contains('/') || name.contains('\0') {
            return Err(SweepError::InvalidArgument {
                details: format!("application name {raw:?} must not contain '/' or NUL"),
            });
        }
        Ok(Self(name.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    /// Read from the bundle manifest.
    Manifest,
    /// `com.<name>.<name>` guessed for a bare directory. Never verified.
    Synthesized,
    Unresolved,
}

/// Who the application is, as far as the locator could tell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationIdentity {
    pub name: String,
    pub identifier: Option<String>,
    pub identifier_source: IdentifierSource,
}

impl ApplicationIdentity {
    #[must_use]
    pub fn unresolved(name: &AppName) -> Self {
        Self {
            name: name.as_str().to_string(),
            identifier: None,
            identifier_source: IdentifierSource::Unresolved,
        }
    }

    #[must_use]
    pub fn from_manifest(name: &AppName, identifier: String) -> Self {
        Self {
            name: name.as_str().to_string(),
            identifier: Some(identifier),
            identifier_source: IdentifierSource::Manifest,
        }
    }

    /// Fallback identifier for bundles found as bare directories.
    #[must_use]
    pub fn synthesized(name: &AppName) -> Self {
        let folded = name.as_str().to_lowercase();
        Self {
            name: name.as_str().to_string(),
            identifier: Some(format!("com.{folded}.{folded}")),
            identifier_source: IdentifierSource::Synthesized,
        }
    }
}

/// Which probe matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleMatch {
    Canonical,
    BareDirectory,
}

/// Result of a bundle lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub identity: ApplicationIdentity,
    pub bundle: Option<Artifact>,
    pub bundle_match: Option<BundleMatch>,
    /// Set when a canonical bundle was found but its identifier was unreadable.
    pub manifest_error: Option<ManifestError>,
    /// Every candidate path checked, in probe order.
    pub probed: Vec<PathBuf>,
}

impl Location {
    /// No bundle anywhere.
    #[must_use]
    pub fn not_found(name: &AppName, probed: Vec<PathBuf>) -> Self {
        Self {
            identity: ApplicationIdentity::unresolved(name),
            bundle: None,
            bundle_match: None,
            manifest_error: None,
            probed,
        }
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.bundle.is_some()
    }
}

/// Finds an application's primary bundle.
pub trait BundleLocator {
    fn locate(&self, name: &AppName) -> Location;
}

/// Probes install roots on the real filesystem.
#[derive(Debug, Clone)]
pub struct InstallRootLocator {
    roots: Vec<PathBuf>,
    suffix: String,
    manifest_path: PathBuf,
    identifier_key: String,
}

impl InstallRootLocator {
    #[must_use]
    pub fn new(
        roots: Vec<PathBuf>,
        suffix: impl Into<String>,
        manifest_path: impl Into<PathBuf>,
        identifier_key: impl Into<String>,
    ) -> Self {
        Self {
            roots,
            suffix: suffix.into(),
            manifest_path: manifest_path.into(),
            identifier_key: identifier_key.into(),
        }
    }

    /// System install roots first, then per-user roots under `home`.
    #[must_use]
    pub fn from_config(config: &Config, home: &Path) -> Self {
        let roots = config
            .roots
            .system_install_roots
            .iter()
            .cloned()
            .chain(
                config
                    .roots
                    .user_install_dirs
                    .iter()
                    .map(|rel| home_relative(home, rel)),
            )
            .collect();
        Self::new(
            roots,
            config.bundle.suffix.clone(),
            config.bundle.manifest_path.clone(),
            config.bundle.identifier_key.clone(),
        )
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn resolve_canonical(&self, name: &AppName, bundle: PathBuf, probed: Vec<PathBuf>) -> Location {
        let (identity, manifest_error) =
            match manifest::read_identifier(&bundle, &self.manifest_path, &self.identifier_key) {
                Ok(identifier) => (ApplicationIdentity::from_manifest(name, identifier), None),
                Err(err) => (ApplicationIdentity::unresolved(name), Some(err)),
            };
        Location {
            identity,
            bundle: Some(Artifact::new(bundle, ArtifactKind::Bundle)),
            bundle_match: Some(BundleMatch::Canonical),
            manifest_error,
            probed,
        }
    }
}

impl BundleLocator for InstallRootLocator {
    fn locate(&self, name: &AppName) -> Location {
        let mut probed = Vec::with_capacity(self.roots.len() * 2);
        for root in &self.roots {
            let canonical = root.join(format!("{}{}", name.as_str(), self.suffix));
            probed.push(canonical.clone());
            if fs::metadata(&canonical).is_ok() {
                return self.resolve_canonical(name, canonical, probed);
            }

            let bare = root.join(name.as_str());
            probed.push(bare.clone());
            if fs::metadata(&bare).is_ok_and(|m| m.is_dir()) {
                return Location {
                    identity: ApplicationIdentity::synthesized(name),
                    bundle: Some(Artifact::new(bare, ArtifactKind::Bundle)),
                    bundle_match: Some(BundleMatch::BareDirectory),
                    manifest_error: None,
                    probed,
                };
            }
        }
        Location::not_found(name, probed)
    }
}

/// Returns prepared locations by name. Unknown names are not found.
#[derive(Debug, Clone, Default)]
pub struct FixedLocator {
    entries: HashMap<String, Location>,
}

impl FixedLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &AppName, location: Location) -> Self {
        self.entries.insert(name.as_str().to_string(), location);
        self
    }
}

impl BundleLocator for FixedLocator {
    fn locate(&self, name: &AppName) -> Location {
        self.entries
            .get(name.as_str())
            .cloned()
            .unwrap_or_else(|| Location::not_found(name, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::Value;

    fn name(raw: &str) -> AppName {
        AppName::parse(raw, ".app").unwrap()
    }

    fn locator(roots: &[&Path]) -> InstallRootLocator {
        InstallRootLocator::new(
            roots.iter().map(|r| r.to_path_buf()).collect(),
            ".app",
            "Contents/Info.plist",
            "CFBundleIdentifier",
        )
    }

    fn write_bundle(root: &Path, file_name: &str, identifier: Option<&str>) -> PathBuf {
        let bundle = root.join(file_name);
        fs::create_dir_all(bundle.join("Contents")).unwrap();
        if let Some(id) = identifier {
            let mut dict = plist::Dictionary::new();
            dict.insert("CFBundleIdentifier".into(), Value::String(id.into()));
            Value::Dictionary(dict)
                .to_file_xml(bundle.join("Contents/Info.plist"))
                .unwrap();
        }
        bundle
    }

    #[test]
    fn app_name_strips_suffix_and_whitespace() {
        assert_eq!(name("  Foo.app ").as_str(), "Foo");
        assert_eq!(name("Foo.APP").as_str(), "Foo");
        assert_eq!(name("Visual Studio Code").as_str(), "Visual Studio Code");
    }

    #[test]
    fn app_name_rejects_degenerate_input() {
        for raw in ["", "   ", ".app", ".", "..", "a/b", "/", "a\0b"] {
            let err = AppName::parse(raw, ".app").unwrap_err();
            assert_eq!(err.code(), "ASW-1101", "input {raw:?}");
        }
    }

    #[test]
    fn canonical_bundle_with_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = write_bundle(tmp.path(), "Foo.app", Some("com.example.foo"));

        let loc = locator(&[tmp.path()]).locate(&name("Foo"));
        assert_eq!(loc.identity.identifier.as_deref(), Some("com.example.foo"));
        assert_eq!(loc.identity.identifier_source, IdentifierSource::Manifest);
        assert_eq!(loc.bundle_match, Some(BundleMatch::Canonical));
        assert_eq!(loc.bundle.as_ref().unwrap().path, bundle);
        assert_eq!(loc.bundle.as_ref().unwrap().kind, ArtifactKind::Bundle);
        assert!(loc.manifest_error.is_none());
    }

    #[test]
    fn canonical_bundle_without_manifest_reports_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_bundle(tmp.path(), "Foo.app", None);

        let loc = locator(&[tmp.path()]).locate(&name("Foo"));
        assert!(loc.is_installed());
        assert_eq!(loc.identity.identifier, None);
        assert_eq!(loc.identity.identifier_source, IdentifierSource::Unresolved);
        assert!(matches!(loc.manifest_error, Some(ManifestError::Missing { .. })));
    }

    #[test]
    fn bare_directory_synthesizes_identifier() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("MyTool")).unwrap();

        let loc = locator(&[tmp.path()]).locate(&name("MyTool"));
        assert_eq!(loc.bundle_match, Some(BundleMatch::BareDirectory));
        assert_eq!(loc.identity.identifier.as_deref(), Some("com.mytool.mytool"));
        assert_eq!(loc.identity.identifier_source, IdentifierSource::Synthesized);
        assert!(loc.manifest_error.is_none());
    }

    #[test]
    fn bare_file_is_not_a_match() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("MyTool"), b"binary").unwrap();

        let loc = locator(&[tmp.path()]).locate(&name("MyTool"));
        assert!(!loc.is_installed());
        assert_eq!(loc.probed.len(), 2);
    }

    #[test]
    fn canonical_beats_bare_in_same_root() {
        let tmp = tempfile::tempdir().unwrap();
        write_bundle(tmp.path(), "Foo.app", Some("com.example.foo"));
        fs::create_dir(tmp.path().join("Foo")).unwrap();

        let loc = locator(&[tmp.path()]).locate(&name("Foo"));
        assert_eq!(loc.bundle_match, Some(BundleMatch::Canonical));
        assert_eq!(loc.probed.len(), 1);
    }

    #[test]
    fn first_root_wins_and_search_stops() {
        let system = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        fs::create_dir(system.path().join("Foo")).unwrap();
        write_bundle(user.path(), "Foo.app", Some("com.user.foo"));

        let loc = locator(&[system.path(), user.path()]).locate(&name("Foo"));
        assert_eq!(loc.bundle_match, Some(BundleMatch::BareDirectory));
        assert_eq!(loc.bundle.unwrap().path, system.path().join("Foo"));
        assert!(loc.probed.iter().all(|p| p.starts_with(system.path())));
    }

    #[test]
    fn falls_through_to_user_root() {
        let system = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        write_bundle(user.path(), "Foo.app", Some("com.user.foo"));

        let loc = locator(&[system.path(), user.path()]).locate(&name("Foo"));
        assert_eq!(loc.identity.identifier.as_deref(), Some("com.user.foo"));
        assert_eq!(loc.probed.len(), 3);
    }

    #[test]
    fn nothing_installed_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let loc = locator(&[tmp.path(), &tmp.path().join("missing")]).locate(&name("Ghost"));
        assert!(!loc.is_installed());
        assert_eq!(loc.identity.name, "Ghost");
        assert_eq!(loc.identity.identifier, None);
        assert_eq!(loc.probed.len(), 4);
    }

    #[test]
    fn from_config_orders_system_before_user() {
        let mut cfg = Config::default();
        cfg.roots.system_install_roots = vec![PathBuf::from("/Applications")];
        cfg.roots.user_install_dirs = vec![PathBuf::from("Applications")];
        let loc = InstallRootLocator::from_config(&cfg, Path::new("/Users/a"));
        assert_eq!(
            loc.roots(),
            [
                PathBuf::from("/Applications"),
                PathBuf::from("/Users/a/Applications")
            ]
        );
    }

    #[test]
    fn fixed_locator_returns_prepared_location() {
        let foo = name("Foo");
        let prepared = Location {
            identity: ApplicationIdentity::from_manifest(&foo, "com.fixed.foo".into()),
            bundle: Some(Artifact::new("/Applications/Foo.app", ArtifactKind::Bundle)),
            bundle_match: Some(BundleMatch::Canonical),
            manifest_error: None,
            probed: vec![],
        };
        let fixed = FixedLocator::new().with(&foo, prepared.clone());
        assert_eq!(fixed.locate(&foo), prepared);
        assert!(!fixed.locate(&name("Bar")).is_installed());
    }
}
