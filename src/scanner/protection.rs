//! Deletion-safety classification.
//!
//! Rules are evaluated in fixed precedence, first match wins:
//!
//! 1. critical system roots: never deletable
//! 2. personal-data roots under home: never deletable
//! 3. per-application support roots under home: deletable
//! 4. install roots: deletable
//! 5. anything else: not deletable
//!
//! Matching is a component-wise prefix test on lexically normalized absolute
//! paths. `/usr/binary` is not under `/usr/bin`, and
//! `~/Library/Caches/../../Documents` is under `~/Documents`. The filesystem is
//! never consulted.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::config::RootsConfig;
use crate::core::paths::{home_relative, is_strictly_within, is_within, normalize_lexical};

/// Path → deletable predicate.
pub trait SafetyClassifier {
    /// Pure and total: same input, same answer, no I/O.
    fn classify(&self, path: &Path) -> bool;
}

/// The root lists the classifier decides from. Every entry is absolute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootRules {
    pub critical: Vec<PathBuf>,
    pub unsafe_roots: Vec<PathBuf>,
    pub safe_roots: Vec<PathBuf>,
    pub install_roots: Vec<PathBuf>,
}

impl RootRules {
    /// Anchor home-relative entries at `home`.
    #[must_use]
    pub fn from_config(roots: &RootsConfig, home: &Path) -> Self {
        let under_home = |list: &[PathBuf]| -> Vec<PathBuf> {
            list.iter().map(|rel| home_relative(home, rel)).collect()
        };
        Self {
            critical: roots.critical.clone(),
            unsafe_roots: under_home(&roots.unsafe_dirs),
            safe_roots: under_home(&roots.safe_dirs),
            install_roots: roots
                .system_install_roots
                .iter()
                .cloned()
                .chain(under_home(&roots.user_install_dirs))
                .collect(),
        }
    }

    fn normalized(self) -> Self {
        let clean = |list: Vec<PathBuf>| -> Vec<PathBuf> {
            list.into_iter()
                .filter_map(|p| normalize_lexical(&p))
                .collect()
        };
        Self {
            critical: clean(self.critical),
            unsafe_roots: clean(self.unsafe_roots),
            safe_roots: clean(self.safe_roots),
            install_roots: clean(self.install_roots),
        }
    }
}

/// Why a path was (or was not) judged deletable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Critical(PathBuf),
    Unsafe(PathBuf),
    Safe(PathBuf),
    Install(PathBuf),
    Unmatched,
    NotAbsolute,
}

impl Verdict {
    #[must_use]
    pub const fn is_deletable(&self) -> bool {
        matches!(self, Self::Safe(_) | Self::Install(_))
    }

    /// Short rule name for reports.
    #[must_use]
    pub const fn rule(&self) -> &'static str {
        match self {
            Self::Critical(_) => "critical",
            Self::Unsafe(_) => "unsafe",
            Self::Safe(_) => "safe",
            Self::Install(_) => "install",
            Self::Unmatched => "unmatched",
            Self::NotAbsolute => "not_absolute",
        }
    }

    /// The root that decided, if any.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        match self {
            Self::Critical(r) | Self::Unsafe(r) | Self::Safe(r) | Self::Install(r) => Some(r),
            Self::Unmatched | Self::NotAbsolute => None,
        }
    }
}

/// Classifier backed by [`RootRules`].
#[derive(Debug, Clone)]
pub struct RootRuleClassifier {
    rules: RootRules,
}

impl RootRuleClassifier {
    /// Root entries are normalized once here. Relative entries are dropped,
    /// since they could never contain an absolute path.
    #[must_use]
    pub fn new(rules: RootRules) -> Self {
        Self {
            rules: rules.normalized(),
        }
    }

    #[must_use]
    pub fn rules(&self) -> &RootRules {
        &self.rules
    }

    /// Full decision with the rule and root that produced it.
    #[must_use]
    pub fn explain(&self, path: &Path) -> Verdict {
        let Some(path) = normalize_lexical(path) else {
            return Verdict::NotAbsolute;
        };

        if let Some(root) = first_root(&self.rules.critical, &path, is_within) {
            return Verdict::Critical(root);
        }
        if let Some(root) = first_root(&self.rules.unsafe_roots, &path, is_within) {
            return Verdict::Unsafe(root);
        }
        if let Some(root) = first_root(&self.rules.safe_roots, &path, is_strictly_within) {
            return Verdict::Safe(root);
        }
        if let Some(root) = first_root(&self.rules.install_roots, &path, is_strictly_within) {
            return Verdict::Install(root);
        }
        Verdict::Unmatched
    }
}

impl SafetyClassifier for RootRuleClassifier {
    fn classify(&self, path: &Path) -> bool {
        self.explain(path).is_deletable()
    }
}

fn first_root(
    roots: &[PathBuf],
    path: &Path,
    contains: fn(&Path, &Path) -> bool,
) -> Option<PathBuf> {
    roots.iter().find(|root| contains(path, root)).cloned()
}

/// Explicit path → verdict table. Anything not listed is not deletable.
#[derive(Debug, Clone, Default)]
pub struct VerdictTable {
    verdicts: HashMap<PathBuf, bool>,
}

impl VerdictTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn allow(mut self, path: impl Into<PathBuf>) -> Self {
        self.verdicts.insert(path.into(), true);
        self
    }

    #[must_use]
    pub fn deny(mut self, path: impl Into<PathBuf>) -> Self {
        self.verdicts.insert(path.into(), false);
        self
    }
}

impl SafetyClassifier for VerdictTable {
    fn classify(&self, path: &Path) -> bool {
        self.verdicts.get(path).copied().unwrap_or(false)
    }
}
