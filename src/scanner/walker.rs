//! Library-root walker: discovers auxiliary artifacts for one application.
//!
//! Each configured root is walked depth-first, pre-order, children in
//! byte-wise name order. A matching directory is reported whole and not
//! descended, so one logical artifact never explodes into its contents. The
//! root itself is never evaluated. Missing roots and unreadable directories
//! are recorded and skipped; a scan never fails as a whole.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, FileType};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::core::paths::home_relative;
use crate::scanner::locator::Location;
use crate::scanner::patterns::{ArtifactMatcher, ExclusionFilter};

/// What kind of filesystem object an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Bundle,
    File,
    Directory,
}

/// A candidate for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Walker configuration with every root already anchored at home.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub library_roots: Vec<PathBuf>,
    pub max_depth: usize,
    pub follow_symlinks: bool,
    pub exclusions: ExclusionFilter,
}

impl ScannerConfig {
    pub fn from_config(config: &Config, home: &Path) -> Result<Self> {
        Ok(Self {
            library_roots: config
                .scan
                .library_dirs
                .iter()
                .map(|rel| home_relative(home, rel))
                .collect(),
            max_depth: config.scan.max_depth,
            follow_symlinks: config.scan.follow_symlinks,
            exclusions: ExclusionFilter::new(&config.scan.exclude)?,
        })
    }
}

/// A directory that could not be listed. Its subtree was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanAccessError {
    pub path: PathBuf,
    pub code: &'static str,
    pub message: String,
}

impl ScanAccessError {
    fn new(path: &Path, err: &std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            code: "ASW-2002",
            message: err.to_string(),
        }
    }
}

/// Everything one scan produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Bundle first, then discoveries in walk order. No duplicates.
    pub artifacts: Vec<Artifact>,
    pub access_errors: Vec<ScanAccessError>,
    pub missing_roots: Vec<PathBuf>,
    pub entries_visited: u64,
    pub excluded: u64,
    /// Directories left unopened because they sit at `max_depth`.
    pub depth_limited: u64,
}

impl ScanReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.artifacts.iter().any(|a| a.path == path)
    }
}

struct DirEntryInfo {
    path: PathBuf,
    name: OsString,
    file_type: FileType,
}

/// Discovers artifacts across the configured library roots.
#[derive(Debug, Clone)]
pub struct ArtifactScanner {
    config: ScannerConfig,
}

impl ArtifactScanner {
    #[must_use]
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn scan(&self, location: &Location) -> ScanReport {
        let mut report = ScanReport::default();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        if let Some(bundle) = &location.bundle {
            seen.insert(bundle.path.clone());
            report.artifacts.push(bundle.clone());
        }

        let matcher = ArtifactMatcher::for_identity(&location.identity);
        for root in &self.config.library_roots {
            self.walk_root(root, &matcher, &mut seen, &mut report);
        }
        report
    }

    fn walk_root(
        &self,
        root: &Path,
        matcher: &ArtifactMatcher,
        seen: &mut HashSet<PathBuf>,
        report: &mut ScanReport,
    ) {
        match fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                report.missing_roots.push(root.to_path_buf());
                return;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                report.missing_roots.push(root.to_path_buf());
                return;
            }
            Err(err) => {
                report.access_errors.push(ScanAccessError::new(root, &err));
                return;
            }
        }

        let mut visited: HashSet<PathBuf> = HashSet::new();
        if self.config.follow_symlinks
            && let Ok(canonical) = fs::canonicalize(root)
        {
            visited.insert(canonical);
        }

        let mut stack: Vec<(DirEntryInfo, usize)> = Vec::new();
        match list_sorted(root, &mut report.access_errors) {
            Ok(children) => stack.extend(children.into_iter().rev().map(|c| (c, 1))),
            Err(err) => {
                report.access_errors.push(ScanAccessError::new(root, &err));
                return;
            }
        }

        while let Some((entry, depth)) = stack.pop() {
            report.entries_visited += 1;

            if self.config.exclusions.is_excluded(&entry.path) {
                report.excluded += 1;
                continue;
            }

            let name = entry.name.to_string_lossy();
            if matcher.matches(&name) {
                if seen.insert(entry.path.clone()) {
                    let kind = if entry.file_type.is_dir() {
                        ArtifactKind::Directory
                    } else {
                        ArtifactKind::File
                    };
                    report.artifacts.push(Artifact::new(entry.path, kind));
                }
                continue;
            }

            let Some(dir) = self.descendable(&entry, &mut visited) else {
                continue;
            };
            if depth >= self.config.max_depth {
                report.depth_limited += 1;
                continue;
            }

            match list_sorted(&dir, &mut report.access_errors) {
                Ok(children) => stack.extend(children.into_iter().rev().map(|c| (c, depth + 1))),
                // Vanished between listing and descent.
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => report
                    .access_errors
                    .push(ScanAccessError::new(&dir, &err)),
            }
        }
    }

    /// The directory to list for `entry`, if it should be entered at all.
    ///
    /// A followed symlink is listed through its canonical path, so everything
    /// found beneath it is reported where it really lives.
    fn descendable(&self, entry: &DirEntryInfo, visited: &mut HashSet<PathBuf>) -> Option<PathBuf> {
        if entry.file_type.is_dir() {
            if self.config.follow_symlinks
                && let Ok(canonical) = fs::canonicalize(&entry.path)
            {
                return visited.insert(canonical).then(|| entry.path.clone());
            }
            return Some(entry.path.clone());
        }
        if entry.file_type.is_symlink() && self.config.follow_symlinks {
            if !fs::metadata(&entry.path).is_ok_and(|m| m.is_dir()) {
                return None;
            }
            let canonical = fs::canonicalize(&entry.path).ok()?;
            return visited.insert(canonical.clone()).then_some(canonical);
        }
        None
    }
}

/// List `dir` in name order. Entries that cannot be read are recorded and
/// skipped; only a failure to open `dir` itself is returned.
fn list_sorted(
    dir: &Path,
    errors: &mut Vec<ScanAccessError>,
) -> std::io::Result<Vec<DirEntryInfo>> {
    let entries = fs::read_dir(dir)?.map(|entry| {
        let entry = entry?;
        Ok(DirEntryInfo {
            path: entry.path(),
            name: entry.file_name(),
            file_type: entry.file_type()?,
        })
    });
    Ok(collect_sorted(dir, entries, errors))
}

fn collect_sorted(
    dir: &Path,
    entries: impl Iterator<Item = std::io::Result<DirEntryInfo>>,
    errors: &mut Vec<ScanAccessError>,
) -> Vec<DirEntryInfo> {
    let mut listed = Vec::new();
    for entry in entries {
        match entry {
            Ok(info) => listed.push(info),
            Err(err) => errors.push(ScanAccessError::new(dir, &err)),
        }
    }
    listed.sort_by(|a, b| a.name.cmp(&b.name));
    listed
}

/// Recursive size in bytes. Symlinks count as themselves and are not followed.
/// Unreadable entries contribute nothing.
#[must_use]
pub fn disk_usage(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if !meta.is_dir() {
        return meta.len();
    }

    let mut total = 0u64;
    let mut stack = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(read_dir) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in read_dir.flatten() {
            let Ok(meta) = fs::symlink_metadata(entry.path()) else {
                continue;
            };
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                total = total.saturating_add(meta.len());
            }
        }
    }
    total
}
