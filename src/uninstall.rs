//! Uninstall facade: the four operations a front end needs, wired from one
//! configuration.
//!
//! ```rust,no_run
//! use appsweep::prelude::*;
//!
//! let config = Config::load(None)?;
//! let sweeper = Uninstaller::from_config(&config)?;
//! let name = sweeper.app_name("Foo.app")?;
//! let location = sweeper.locate(&name);
//! let scan = sweeper.scan(&location);
//! let report = sweeper.delete(&scan.artifacts, None)?;
//! println!("deleted {}", report.deleted_count);
//! # Ok::<(), appsweep::core::errors::SweepError>(())
//! ```

use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::logger::activity::ActivityLog;
use crate::scanner::deletion::{DeletionExecutor, DeletionReport};
use crate::scanner::locator::{AppName, BundleLocator, InstallRootLocator, Location};
use crate::scanner::protection::{RootRuleClassifier, RootRules, SafetyClassifier};
use crate::scanner::walker::{Artifact, ArtifactScanner, ScanReport, ScannerConfig};

/// Locator, scanner and classifier for one session.
pub struct Uninstaller<L = InstallRootLocator, C = RootRuleClassifier> {
    locator: L,
    scanner: ArtifactScanner,
    classifier: C,
    bundle_suffix: String,
    home: PathBuf,
}

impl Uninstaller {
    /// Build the real components from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let home = config.home_dir()?;
        Ok(Self {
            locator: InstallRootLocator::from_config(config, &home),
            scanner: ArtifactScanner::new(ScannerConfig::from_config(config, &home)?),
            classifier: RootRuleClassifier::new(RootRules::from_config(&config.roots, &home)),
            bundle_suffix: config.bundle.suffix.clone(),
            home,
        })
    }
}

impl<L: BundleLocator, C: SafetyClassifier> Uninstaller<L, C> {
    /// Assemble from explicit parts, e.g. test doubles.
    pub fn new(
        locator: L,
        scanner: ArtifactScanner,
        classifier: C,
        bundle_suffix: impl Into<String>,
        home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            locator,
            scanner,
            classifier,
            bundle_suffix: bundle_suffix.into(),
            home: home.into(),
        }
    }

    /// Validate raw user input into an [`AppName`].
    pub fn app_name(&self, raw: &str) -> Result<AppName> {
        AppName::parse(raw, &self.bundle_suffix)
    }

    pub fn locate(&self, name: &AppName) -> Location {
        self.locator.locate(name)
    }

    pub fn scan(&self, location: &Location) -> ScanReport {
        self.scanner.scan(location)
    }

    pub fn classify(&self, path: &Path) -> bool {
        self.classifier.classify(path)
    }

    /// Fails only on malformed input; per-artifact trouble lands in the report.
    pub fn delete(
        &self,
        artifacts: &[Artifact],
        activity: Option<&mut ActivityLog>,
    ) -> Result<DeletionReport> {
        DeletionExecutor::new(&self.classifier).execute(artifacts, activity)
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn scanner(&self) -> &ArtifactScanner {
        &self.scanner
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::locator::{ApplicationIdentity, BundleMatch, FixedLocator};
    use crate::scanner::patterns::ExclusionFilter;
    use crate::scanner::protection::VerdictTable;
    use crate::scanner::walker::ArtifactKind;
    use std::fs;

    #[test]
    fn doubles_drive_the_whole_flow() {
        let tmp = tempfile::tempdir().unwrap();
        let caches = tmp.path().join("Caches");
        let bundle = tmp.path().join("Apps/Foo.app");
        let cache = caches.join("com.fixture.foo");
        fs::create_dir_all(&bundle).unwrap();
        fs::create_dir_all(&cache).unwrap();

        let name = AppName::parse("Foo", ".app").unwrap();
        let located = Location {
            identity: ApplicationIdentity::from_manifest(&name, "com.fixture.foo".into()),
            bundle: Some(Artifact::new(&bundle, ArtifactKind::Bundle)),
            bundle_match: Some(BundleMatch::Canonical),
            manifest_error: None,
            probed: vec![bundle.clone()],
        };
        let scanner = ArtifactScanner::new(ScannerConfig {
            library_roots: vec![caches],
            max_depth: 8,
            follow_symlinks: false,
            exclusions: ExclusionFilter::default(),
        });
        let sweeper = Uninstaller::new(
            FixedLocator::new().with(&name, located),
            scanner,
            VerdictTable::new().allow(&cache),
            ".app",
            tmp.path(),
        );

        let location = sweeper.locate(&sweeper.app_name("Foo.app").unwrap());
        let scan = sweeper.scan(&location);
        assert_eq!(scan.artifacts.len(), 2);

        let report = sweeper.delete(&scan.artifacts, None).unwrap();
        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.skipped_unsafe_count(), 1);
        assert!(bundle.exists());
        assert!(!cache.exists());
    }

    #[test]
    fn from_config_uses_configured_home() {
        let mut config = Config::default();
        config.paths.home = Some(PathBuf::from("/Users/fixture"));
        let sweeper = Uninstaller::from_config(&config).unwrap();
        assert_eq!(sweeper.home(), Path::new("/Users/fixture"));
        assert!(sweeper.classify(Path::new("/Users/fixture/Library/Caches/x")));
        assert!(!sweeper.classify(Path::new("/Users/fixture/Documents/x")));
    }
}
