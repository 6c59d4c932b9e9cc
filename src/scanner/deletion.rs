//! Deletion executor: per-artifact removal with failure isolation.
//!
//! Every artifact is reclassified immediately before removal, whatever the
//! caller decided earlier. The path removed is the lexically normalized path
//! that was classified, and a symlink inside an allowed area must also lead
//! somewhere allowed. One failing artifact never stops the batch; the
//! only batch-level error is malformed input, rejected before anything is
//! touched.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::errors::{Result, SweepError};
use crate::core::paths::normalize_lexical;
use crate::logger::activity::{ActivityEvent, ActivityLog};
use crate::scanner::protection::SafetyClassifier;
use crate::scanner::walker::{Artifact, ArtifactKind};

/// Final state of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
    Deleted,
    SkippedUnsafe,
    /// Already gone: a repeated run is not a failure.
    SkippedMissing,
    Failed,
}

impl DeletionStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::SkippedUnsafe => "skipped_unsafe",
            Self::SkippedMissing => "skipped_missing",
            Self::Failed => "failed",
        }
    }
}

/// Why an artifact failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeError {
    pub code: String,
    pub message: String,
    /// Retrying later might succeed.
    pub recoverable: bool,
}

impl From<&SweepError> for OutcomeError {
    fn from(err: &SweepError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            recoverable: err.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub status: DeletionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

/// One outcome per input artifact, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionReport {
    pub deleted_count: usize,
    pub outcomes: Vec<DeletionOutcome>,
    pub duration: Duration,
}

impl DeletionReport {
    fn count(&self, status: DeletionStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    #[must_use]
    pub fn skipped_unsafe_count(&self) -> usize {
        self.count(DeletionStatus::SkippedUnsafe)
    }

    #[must_use]
    pub fn skipped_missing_count(&self) -> usize {
        self.count(DeletionStatus::SkippedMissing)
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(DeletionStatus::Failed)
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.status == DeletionStatus::Failed)
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&DeletionOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == DeletionStatus::Failed)
            .collect()
    }
}

/// Removes artifacts the classifier permits.
pub struct DeletionExecutor<'a> {
    classifier: &'a dyn SafetyClassifier,
}

impl<'a> DeletionExecutor<'a> {
    pub fn new(classifier: &'a dyn SafetyClassifier) -> Self {
        Self { classifier }
    }

    /// Reject batches with an empty or repeated path before deleting anything.
    pub fn validate(artifacts: &[Artifact]) -> Result<()> {
        let mut seen: HashSet<&Path> = HashSet::with_capacity(artifacts.len());
        for artifact in artifacts {
            if artifact.path.as_os_str().is_empty() {
                return Err(SweepError::InvalidArgument {
                    details: "artifact list contains an empty path".to_string(),
                });
            }
            if !seen.insert(artifact.path.as_path()) {
                return Err(SweepError::InvalidArgument {
                    details: format!(
                        "artifact list contains {} more than once",
                        artifact.path.display()
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn execute(
        &self,
        artifacts: &[Artifact],
        mut activity: Option<&mut ActivityLog>,
    ) -> Result<DeletionReport> {
        Self::validate(artifacts)?;
        let start = Instant::now();
        let mut report = DeletionReport {
            outcomes: Vec::with_capacity(artifacts.len()),
            ..DeletionReport::default()
        };

        for artifact in artifacts {
            let outcome = self.process(artifact);
            if let Some(log) = activity.as_deref_mut() {
                log_outcome(log, &outcome);
            }
            if outcome.status == DeletionStatus::Deleted {
                report.deleted_count += 1;
            }
            report.outcomes.push(outcome);
        }

        report.duration = start.elapsed();
        Ok(report)
    }

    fn process(&self, artifact: &Artifact) -> DeletionOutcome {
        let outcome = |status: DeletionStatus, error: Option<OutcomeError>| DeletionOutcome {
            path: artifact.path.clone(),
            kind: artifact.kind,
            status,
            error,
        };

        // Classify and remove the same path. The kernel resolves `..` after
        // following links, so the raw text is never handed to the filesystem.
        let Some(normalized) = normalize_lexical(&artifact.path) else {
            return outcome(DeletionStatus::SkippedUnsafe, None);
        };
        if !self.classifier.classify(&normalized) {
            return outcome(DeletionStatus::SkippedUnsafe, None);
        }

        let target = match self.resolve_target(&normalized) {
            Ok(Some(target)) => target,
            Ok(None) => return outcome(DeletionStatus::SkippedUnsafe, None),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return outcome(DeletionStatus::SkippedMissing, None);
            }
            Err(err) => {
                let err = SweepError::io(&normalized, err);
                return outcome(DeletionStatus::Failed, Some(OutcomeError::from(&err)));
            }
        };

        let meta = match fs::symlink_metadata(&target) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return outcome(DeletionStatus::SkippedMissing, None);
            }
            Err(err) => {
                let err = SweepError::io(&target, err);
                return outcome(DeletionStatus::Failed, Some(OutcomeError::from(&err)));
            }
        };

        match delete_path(&target, meta.is_dir()) {
            Ok(()) => outcome(DeletionStatus::Deleted, None),
            Err(Removal::Gone) => outcome(DeletionStatus::SkippedMissing, None),
            Err(Removal::Failed(err)) => {
                outcome(DeletionStatus::Failed, Some(OutcomeError::from(&err)))
            }
        }
    }

    /// The path the filesystem will actually act on.
    ///
    /// Ancestors inside the allowed area are checked for symlinks. If one is
    /// found, the parent is resolved and the real location must classify as
    /// deletable too; `None` means it does not. The walk stops at the first
    /// ancestor the classifier rejects, i.e. the root itself or above it.
    fn resolve_target(&self, path: &Path) -> std::io::Result<Option<PathBuf>> {
        let mut through_link = false;
        for ancestor in path.ancestors().skip(1) {
            if !self.classifier.classify(ancestor) {
                break;
            }
            if fs::symlink_metadata(ancestor)?.file_type().is_symlink() {
                through_link = true;
                break;
            }
        }
        if !through_link {
            return Ok(Some(path.to_path_buf()));
        }

        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Ok(None);
        };
        let real = fs::canonicalize(parent)?.join(name);
        Ok(self.classifier.classify(&real).then_some(real))
    }
}

enum Removal {
    Gone,
    Failed(SweepError),
}

/// `is_dir` comes from `symlink_metadata`, so a symlink to a directory is
/// unlinked rather than recursed into.
fn delete_path(path: &Path, is_dir: bool) -> std::result::Result<(), Removal> {
    let removed = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(Removal::Gone),
        Err(err) => return Err(Removal::Failed(SweepError::io(path, err))),
    }

    if fs::symlink_metadata(path).is_ok() {
        return Err(Removal::Failed(SweepError::Runtime {
            details: format!("path still exists after deletion: {}", path.display()),
        }));
    }
    Ok(())
}

fn log_outcome(log: &mut ActivityLog, outcome: &DeletionOutcome) {
    let path = outcome.path.as_path();
    match (&outcome.status, &outcome.error) {
        (DeletionStatus::Deleted, _) => log.record(&ActivityEvent::ArtifactDeleted {
            path,
            kind: kind_label(outcome.kind),
        }),
        (DeletionStatus::Failed, Some(err)) => log.record(&ActivityEvent::ArtifactFailed {
            path,
            code: &err.code,
            message: &err.message,
        }),
        (status, _) => log.record(&ActivityEvent::ArtifactSkipped {
            path,
            status: status.label(),
        }),
    }
}

#[must_use]
pub const fn kind_label(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Bundle => "bundle",
        ArtifactKind::File => "file",
        ArtifactKind::Directory => "directory",
    }
}
