//! Append-only JSONL activity log.
//!
//! One self-contained JSON object per line, assembled in memory and written
//! with a single `write_all` so a concurrent `tail -f` never sees half a line.
//!
//! Failures walk down a fixed chain and never reach the caller:
//! primary file, then fallback file, then stderr with an `[ASW-JSONL]` prefix,
//! then silent discard.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SweepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Uninstall-session event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UninstallStart,
    BundleLocated,
    ManifestParseFailed,
    ScanAccessError,
    ScanComplete,
    ArtifactDelete,
    ArtifactSkip,
    ArtifactDeleteFailed,
    UninstallComplete,
    Error,
}

/// One log line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp, millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Normalized application name of the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Artifact kind or bundle match kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Deletion status label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// ASW error code when something went wrong.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// New entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            app: None,
            identifier: None,
            path: None,
            kind: None,
            status: None,
            count: None,
            deleted: None,
            skipped: None,
            failed: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    /// Tried when the primary path cannot be opened or written.
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the current file would grow past this. Default: 10 MiB.
    pub max_size_bytes: u64,
    /// Rotated generations to keep (`.1` newest). Default: 3.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    /// Defaults for a log at `path` with no fallback file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback_path: None,
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Where lines currently go.
enum Sink {
    Primary(BufWriter<File>),
    Fallback(BufWriter<File>),
    Stderr,
    Discard,
}

impl Sink {
    const fn label(&self) -> &'static str {
        match self {
            Self::Primary(_) => "normal",
            Self::Fallback(_) => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }
}

/// Append-only JSONL writer with size rotation and degradation.
pub struct JsonlWriter {
    config: JsonlConfig,
    sink: Sink,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log, degrading as far as needed. Never fails.
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            sink: Sink::Discard,
            bytes_written: 0,
        };
        writer.sink = match open_append(&writer.config.path) {
            Ok((file, size)) => {
                writer.bytes_written = size;
                Sink::Primary(BufWriter::new(file))
            }
            Err(_) => writer.open_fallback(),
        };
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[ASW-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Sink::Primary(w) | Sink::Fallback(w) = &mut self.sink {
            let _ = w.flush();
        }
    }

    /// `normal`, `fallback`, `stderr` or `discard`.
    pub fn state(&self) -> &'static str {
        self.sink.label()
    }

    /// Size of the current file, including what was there when opened.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.bytes_written > 0 && self.bytes_written + len > self.config.max_size_bytes {
            self.rotate();
        }

        let failed = match &mut self.sink {
            Sink::Primary(w) | Sink::Fallback(w) => w.write_all(line.as_bytes()).is_err(),
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[ASW-JSONL] {line}");
                false
            }
            Sink::Discard => false,
        };

        if failed {
            self.degrade();
            self.write_line(line);
        } else if matches!(self.sink, Sink::Primary(_) | Sink::Fallback(_)) {
            self.bytes_written += len;
        }
    }

    fn open_fallback(&mut self) -> Sink {
        let Some(fallback) = self.config.fallback_path.clone() else {
            let _ = writeln!(
                io::stderr(),
                "[ASW-JSONL] cannot open {}, logging to stderr",
                self.config.path.display()
            );
            return Sink::Stderr;
        };
        match open_append(&fallback) {
            Ok((file, size)) => {
                let _ = writeln!(
                    io::stderr(),
                    "[ASW-JSONL] primary path failed, using fallback: {}",
                    fallback.display()
                );
                self.bytes_written = size;
                Sink::Fallback(BufWriter::new(file))
            }
            Err(_) => {
                let _ = writeln!(
                    io::stderr(),
                    "[ASW-JSONL] primary and fallback paths failed, logging to stderr"
                );
                Sink::Stderr
            }
        }
    }

    fn degrade(&mut self) {
        self.bytes_written = 0;
        self.sink = match std::mem::replace(&mut self.sink, Sink::Discard) {
            Sink::Primary(_) => self.open_fallback(),
            Sink::Fallback(_) => Sink::Stderr,
            Sink::Stderr | Sink::Discard => Sink::Discard,
        };
    }

    fn current_path(&self) -> Option<PathBuf> {
        match self.sink {
            Sink::Primary(_) => Some(self.config.path.clone()),
            Sink::Fallback(_) => self.config.fallback_path.clone(),
            Sink::Stderr | Sink::Discard => None,
        }
    }

    fn rotate(&mut self) {
        let Some(base) = self.current_path() else {
            return;
        };
        self.flush();
        let was_primary = matches!(self.sink, Sink::Primary(_));
        self.sink = Sink::Discard;

        let keep = self.config.max_rotated_files;
        if keep == 0 {
            let _ = fs::remove_file(&base);
        } else {
            let _ = fs::remove_file(rotated_name(&base, keep));
            for i in (1..keep).rev() {
                let _ = fs::rename(rotated_name(&base, i), rotated_name(&base, i + 1));
            }
            let _ = fs::rename(&base, rotated_name(&base, 1));
        }

        self.bytes_written = 0;
        self.sink = match open_append(&base) {
            Ok((file, _)) if was_primary => Sink::Primary(BufWriter::new(file)),
            Ok((file, _)) => Sink::Fallback(BufWriter::new(file)),
            Err(_) if was_primary => self.open_fallback(),
            Err(_) => Sink::Stderr,
        };
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Open or create for appending, creating parent directories.
/// Returns the file and its current size.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SweepError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SweepError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// `activity.jsonl` → `activity.jsonl.2`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
