//! Typed uninstall-session events on top of the JSONL writer.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Something worth recording about an uninstall session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent<'a> {
    SessionStart {
        app: &'a str,
        config_hash: &'a str,
        dry_run: bool,
    },
    BundleLocated {
        app: &'a str,
        path: &'a Path,
        kind: &'a str,
        identifier: Option<&'a str>,
    },
    ManifestParseFailed {
        path: &'a Path,
        message: String,
    },
    AccessError {
        path: &'a Path,
        code: &'a str,
        message: &'a str,
    },
    ScanComplete {
        app: &'a str,
        artifacts: usize,
        access_errors: usize,
        duration: Duration,
    },
    ArtifactDeleted {
        path: &'a Path,
        kind: &'a str,
    },
    ArtifactSkipped {
        path: &'a Path,
        status: &'a str,
    },
    ArtifactFailed {
        path: &'a Path,
        code: &'a str,
        message: &'a str,
    },
    SessionComplete {
        app: &'a str,
        deleted: usize,
        skipped: usize,
        failed: usize,
        duration: Duration,
    },
    Error {
        code: &'a str,
        message: String,
    },
}

fn path_string(path: &Path) -> Option<String> {
    Some(path.to_string_lossy().into_owned())
}

#[allow(clippy::cast_possible_truncation)]
fn millis(duration: Duration) -> Option<u64> {
    Some(duration.as_millis() as u64)
}

impl ActivityEvent<'_> {
    #[must_use]
    pub fn to_entry(&self) -> LogEntry {
        match self {
            Self::SessionStart {
                app,
                config_hash,
                dry_run,
            } => {
                let mut e = LogEntry::new(EventType::UninstallStart, Severity::Info);
                e.app = Some((*app).to_string());
                e.details = Some(format!("config_hash={config_hash} dry_run={dry_run}"));
                e
            }
            Self::BundleLocated {
                app,
                path,
                kind,
                identifier,
            } => {
                let mut e = LogEntry::new(EventType::BundleLocated, Severity::Info);
                e.app = Some((*app).to_string());
                e.path = path_string(path);
                e.kind = Some((*kind).to_string());
                e.identifier = identifier.map(String::from);
                e
            }
            Self::ManifestParseFailed { path, message } => {
                let mut e = LogEntry::new(EventType::ManifestParseFailed, Severity::Warning);
                e.path = path_string(path);
                e.error_code = Some("ASW-2001".to_string());
                e.error_message = Some(message.clone());
                e
            }
            Self::AccessError {
                path,
                code,
                message,
            } => {
                let mut e = LogEntry::new(EventType::ScanAccessError, Severity::Warning);
                e.path = path_string(path);
                e.error_code = Some((*code).to_string());
                e.error_message = Some((*message).to_string());
                e
            }
            Self::ScanComplete {
                app,
                artifacts,
                access_errors,
                duration,
            } => {
                let mut e = LogEntry::new(EventType::ScanComplete, Severity::Info);
                e.app = Some((*app).to_string());
                e.count = Some(*artifacts as u64);
                e.failed = Some(*access_errors as u64);
                e.duration_ms = millis(*duration);
                e
            }
            Self::ArtifactDeleted { path, kind } => {
                let mut e = LogEntry::new(EventType::ArtifactDelete, Severity::Info);
                e.path = path_string(path);
                e.kind = Some((*kind).to_string());
                e.status = Some("deleted".to_string());
                e.ok = Some(true);
                e
            }
            Self::ArtifactSkipped { path, status } => {
                let mut e = LogEntry::new(EventType::ArtifactSkip, Severity::Info);
                e.path = path_string(path);
                e.status = Some((*status).to_string());
                e
            }
            Self::ArtifactFailed {
                path,
                code,
                message,
            } => {
                let mut e = LogEntry::new(EventType::ArtifactDeleteFailed, Severity::Warning);
                e.path = path_string(path);
                e.status = Some("failed".to_string());
                e.ok = Some(false);
                e.error_code = Some((*code).to_string());
                e.error_message = Some((*message).to_string());
                e
            }
            Self::SessionComplete {
                app,
                deleted,
                skipped,
                failed,
                duration,
            } => {
                let severity = if *failed > 0 {
                    Severity::Warning
                } else {
                    Severity::Info
                };
                let mut e = LogEntry::new(EventType::UninstallComplete, severity);
                e.app = Some((*app).to_string());
                e.deleted = Some(*deleted as u64);
                e.skipped = Some(*skipped as u64);
                e.failed = Some(*failed as u64);
                e.ok = Some(*failed == 0);
                e.duration_ms = millis(*duration);
                e
            }
            Self::Error { code, message } => {
                let mut e = LogEntry::new(EventType::Error, Severity::Critical);
                e.error_code = Some((*code).to_string());
                e.error_message = Some(message.clone());
                e
            }
        }
    }
}

/// Session activity log. A disabled log accepts and drops everything.
pub struct ActivityLog {
    writer: Option<JsonlWriter>,
    path: Option<PathBuf>,
}

impl ActivityLog {
    #[must_use]
    pub fn open(path: &Path) -> Self {
        Self {
            writer: Some(JsonlWriter::open(JsonlConfig::at(path))),
            path: Some(path.to_path_buf()),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            writer: None,
            path: None,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&mut self, event: &ActivityEvent<'_>) {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_entry(&event.to_entry());
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush();
        }
    }
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("path", &self.path)
            .field("state", &self.writer.as_ref().map(JsonlWriter::state))
            .finish()
    }
}
