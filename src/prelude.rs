//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use appsweep::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SweepError};

// Logging
pub use crate::logger::activity::{ActivityEvent, ActivityLog};

// Scanner
pub use crate::scanner::deletion::{
    DeletionExecutor, DeletionOutcome, DeletionReport, DeletionStatus,
};
pub use crate::scanner::locator::{
    AppName, ApplicationIdentity, BundleLocator, InstallRootLocator, Location,
};
pub use crate::scanner::manifest::ManifestError;
pub use crate::scanner::protection::{RootRuleClassifier, RootRules, SafetyClassifier, Verdict};
pub use crate::scanner::walker::{Artifact, ArtifactKind, ArtifactScanner, ScanReport};

// Facade
pub use crate::uninstall::Uninstaller;
