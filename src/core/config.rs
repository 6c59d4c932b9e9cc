//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SweepError};
use crate::core::paths::is_clean_relative;

/// Full appsweep configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub roots: RootsConfig,
    pub scan: ScanConfig,
    pub bundle: BundleConfig,
    pub paths: PathsConfig,
}

/// Root-path lists driving the deletion-safety classifier and bundle lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RootsConfig {
    /// Absolute prefixes that are never deleted from.
    pub critical: Vec<PathBuf>,
    /// Home-relative personal-data directories (default deny).
    pub unsafe_dirs: Vec<PathBuf>,
    /// Home-relative per-application support directories (default allow).
    pub safe_dirs: Vec<PathBuf>,
    /// Absolute system-wide install roots, searched first.
    pub system_install_roots: Vec<PathBuf>,
    /// Home-relative per-user install roots, searched after the system ones.
    pub user_install_dirs: Vec<PathBuf>,
}

/// Auxiliary-artifact discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanConfig {
    /// Home-relative library directories, scanned in this order.
    pub library_dirs: Vec<PathBuf>,
    pub max_depth: usize,
    pub follow_symlinks: bool,
    /// Exclusion patterns: case-insensitive path fragments or base-name globs.
    pub exclude: Vec<String>,
}

/// Bundle layout conventions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BundleConfig {
    pub suffix: String,
    /// Manifest location relative to the bundle root.
    pub manifest_path: PathBuf,
    pub identifier_key: String,
}

/// Filesystem paths used by appsweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub activity_log: PathBuf,
    /// Overrides `$HOME` for root resolution.
    pub home: Option<PathBuf>,
}

const DEFAULT_LIBRARY_DIRS: [&str; 6] = [
    "Library/Application Support",
    "Library/Preferences",
    "Library/Caches",
    "Library/Logs",
    "Library/Containers",
    "Library/Saved Application State",
];

impl Default for RootsConfig {
    fn default() -> Self {
        Self {
            critical: [
                "/System",
                "/bin",
                "/sbin",
                "/usr/bin",
                "/usr/sbin",
                "/usr/local/bin",
                "/usr/local/sbin",
                "/etc",
                "/var",
                // Lexical matching does not follow the /etc and /var symlinks.
                "/private/etc",
                "/private/var",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
            unsafe_dirs: ["Documents", "Downloads", "Desktop", "Pictures", "Music", "Movies"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            safe_dirs: DEFAULT_LIBRARY_DIRS.into_iter().map(PathBuf::from).collect(),
            system_install_roots: vec![PathBuf::from("/Applications")],
            user_install_dirs: vec![PathBuf::from("Applications")],
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            library_dirs: DEFAULT_LIBRARY_DIRS.into_iter().map(PathBuf::from).collect(),
            max_depth: 32,
            follow_symlinks: false,
            exclude: Vec::new(),
        }
    }
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            suffix: ".app".to_string(),
            manifest_path: PathBuf::from("Contents/Info.plist"),
            identifier_key: "CFBundleIdentifier".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[ASW-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("appsweep").join("config.toml"),
            activity_log: home_dir
                .join(".local")
                .join("share")
                .join("appsweep")
                .join("activity.jsonl"),
            home: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, env_var)
    }

    /// [`Config::load`] with an explicit environment lookup in place of the
    /// process environment.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SweepError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(SweepError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve the home directory roots are anchored at.
    ///
    /// `paths.home` wins over `$HOME`. The result must be absolute.
    pub fn home_dir(&self) -> Result<PathBuf> {
        let home = match &self.paths.home {
            Some(explicit) => explicit.clone(),
            None => env::var_os("HOME")
                .filter(|h| !h.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| SweepError::InvalidConfig {
                    details: "HOME is not set and paths.home is not configured".to_string(),
                })?,
        };
        if !home.is_absolute() {
            return Err(SweepError::InvalidConfig {
                details: format!("home directory must be absolute, got {}", home.display()),
            });
        }
        Ok(home)
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("APPSWEEP_HOME") {
            self.paths.home = Some(PathBuf::from(raw));
        }

        if let Some(raw) = lookup("APPSWEEP_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        if let Some(raw) = lookup("APPSWEEP_SCAN_MAX_DEPTH") {
            self.scan.max_depth = parse_env_usize("APPSWEEP_SCAN_MAX_DEPTH", &raw)?;
        }

        if let Some(raw) = lookup("APPSWEEP_SCAN_FOLLOW_SYMLINKS") {
            self.scan.follow_symlinks = parse_env_bool("APPSWEEP_SCAN_FOLLOW_SYMLINKS", &raw)?;
        }

        if let Some(raw) = lookup("APPSWEEP_SCAN_EXCLUDE") {
            self.scan.exclude.extend(
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            );
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, list) in [
            ("roots.critical", &self.roots.critical),
            ("roots.system_install_roots", &self.roots.system_install_roots),
        ] {
            for entry in list {
                if !entry.is_absolute() {
                    return Err(SweepError::InvalidConfig {
                        details: format!("{name} entries must be absolute, got {}", entry.display()),
                    });
                }
            }
        }

        for (name, list) in [
            ("roots.unsafe_dirs", &self.roots.unsafe_dirs),
            ("roots.safe_dirs", &self.roots.safe_dirs),
            ("roots.user_install_dirs", &self.roots.user_install_dirs),
            ("scan.library_dirs", &self.scan.library_dirs),
        ] {
            for entry in list {
                if !is_clean_relative(entry) {
                    return Err(SweepError::InvalidConfig {
                        details: format!(
                            "{name} entries must be home-relative without '..', got {:?}",
                            entry.display().to_string()
                        ),
                    });
                }
            }
        }

        if self.scan.max_depth == 0 {
            return Err(SweepError::InvalidConfig {
                details: "scan.max_depth must be >= 1".to_string(),
            });
        }

        if self.bundle.suffix.len() < 2 || !self.bundle.suffix.starts_with('.') {
            return Err(SweepError::InvalidConfig {
                details: format!(
                    "bundle.suffix must start with '.' and be non-empty, got {:?}",
                    self.bundle.suffix
                ),
            });
        }

        if !is_clean_relative(&self.bundle.manifest_path) {
            return Err(SweepError::InvalidConfig {
                details: "bundle.manifest_path must be relative to the bundle root".to_string(),
            });
        }

        if self.bundle.identifier_key.trim().is_empty() {
            return Err(SweepError::InvalidConfig {
                details: "bundle.identifier_key must not be empty".to_string(),
            });
        }

        if let Some(home) = &self.paths.home
            && !home.is_absolute()
        {
            return Err(SweepError::InvalidConfig {
                details: format!("paths.home must be absolute, got {}", home.display()),
            });
        }

        for pattern in &self.scan.exclude {
            crate::scanner::patterns::validate_exclusion(pattern)?;
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_usize(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|error| SweepError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| SweepError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::{Config, SweepError};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn defaults_scan_the_six_library_dirs_in_order() {
        let cfg = Config::default();
        let dirs: Vec<String> = cfg
            .scan
            .library_dirs
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(
            dirs,
            [
                "Library/Application Support",
                "Library/Preferences",
                "Library/Caches",
                "Library/Logs",
                "Library/Containers",
                "Library/Saved Application State",
            ]
        );
        assert_eq!(cfg.roots.safe_dirs, cfg.scan.library_dirs);
    }

    #[test]
    fn relative_critical_root_rejected() {
        let mut cfg = Config::default();
        cfg.roots.critical.push(PathBuf::from("System"));
        let err = cfg.validate().expect_err("expected invalid critical root");
        match err {
            SweepError::InvalidConfig { details } => {
                assert!(details.contains("roots.critical"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn escaping_home_relative_dir_rejected() {
        let mut cfg = Config::default();
        cfg.roots.safe_dirs.push(PathBuf::from("Library/../.."));
        let err = cfg.validate().expect_err("expected invalid safe dir");
        assert!(err.to_string().contains("roots.safe_dirs"));
    }

    #[test]
    fn absolute_library_dir_rejected() {
        let mut cfg = Config::default();
        cfg.scan.library_dirs = vec![PathBuf::from("/Library/Caches")];
        let err = cfg.validate().expect_err("expected invalid library dir");
        assert!(err.to_string().contains("scan.library_dirs"));
    }

    #[test]
    fn zero_depth_rejected() {
        let mut cfg = Config::default();
        cfg.scan.max_depth = 0;
        let err = cfg.validate().expect_err("expected depth error");
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn bundle_suffix_must_be_an_extension() {
        let mut cfg = Config::default();
        cfg.bundle.suffix = "app".to_string();
        assert!(cfg.validate().is_err());
        cfg.bundle.suffix = ".".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn relative_home_override_rejected() {
        let mut cfg = Config::default();
        cfg.paths.home = Some(PathBuf::from("home/alice"));
        assert!(cfg.validate().is_err());
        assert!(cfg.home_dir().is_err());
    }

    #[test]
    fn explicit_home_wins() {
        let mut cfg = Config::default();
        cfg.paths.home = Some(PathBuf::from("/Users/tester"));
        assert_eq!(cfg.home_dir().unwrap(), Path::new("/Users/tester"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("APPSWEEP_HOME", "/Users/env"),
            ("APPSWEEP_SCAN_MAX_DEPTH", "4"),
            ("APPSWEEP_SCAN_FOLLOW_SYMLINKS", "true"),
            ("APPSWEEP_SCAN_EXCLUDE", "*.log, keep-me ,"),
            ("APPSWEEP_ACTIVITY_LOG", "/tmp/appsweep/activity.jsonl"),
        ]);

        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");

        assert_eq!(cfg.paths.home, Some(PathBuf::from("/Users/env")));
        assert_eq!(cfg.scan.max_depth, 4);
        assert!(cfg.scan.follow_symlinks);
        assert_eq!(cfg.scan.exclude, vec!["*.log", "keep-me"]);
        assert_eq!(
            cfg.paths.activity_log,
            PathBuf::from("/tmp/appsweep/activity.jsonl")
        );
    }

    #[test]
    fn env_invalid_boolean_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("APPSWEEP_SCAN_FOLLOW_SYMLINKS", "yes-please")]);

        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid bool should fail");
        match err {
            SweepError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("APPSWEEP_SCAN_FOLLOW_SYMLINKS"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn toml_sections_override_defaults() {
        let raw = r#"
            [roots]
            critical = ["/System", "/opt/vendor"]

            [scan]
            max_depth = 5
            exclude = ["*.keep"]

            [paths]
            home = "/Users/fixture"
        "#;
        let cfg: Config = toml::from_str(raw).expect("parse");
        assert_eq!(cfg.roots.critical.len(), 2);
        assert_eq!(cfg.scan.max_depth, 5);
        assert_eq!(cfg.scan.library_dirs.len(), 6, "unset fields keep defaults");
        assert_eq!(cfg.bundle.suffix, ".app");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let result = Config::load(Some(Path::new("/nonexistent/appsweep/config.toml")));
        assert!(matches!(result, Err(SweepError::MissingConfig { .. })));
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[scan]\nmax_depth = 3\n").unwrap();
        let cfg = Config::load_with_env(Some(&path), |_| None).expect("load");
        assert_eq!(cfg.scan.max_depth, 3);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn load_applies_injected_env_over_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[scan]\nmax_depth = 3\n").unwrap();
        let env = vars(&[
            ("APPSWEEP_SCAN_MAX_DEPTH", "9"),
            ("APPSWEEP_SCAN_EXCLUDE", "*.keep"),
        ]);
        let cfg = Config::load_with_env(Some(&path), |name| env.get(name).cloned()).expect("load");
        assert_eq!(cfg.scan.max_depth, 9);
        assert_eq!(cfg.scan.exclude, vec!["*.keep".to_string()]);
    }

    #[test]
    fn load_rejects_invalid_injected_env() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let env = vars(&[("APPSWEEP_SCAN_MAX_DEPTH", "0")]);
        let result = Config::load_with_env(Some(&path), |name| env.get(name).cloned());
        assert!(matches!(result, Err(SweepError::InvalidConfig { .. })));
    }

    #[test]
    fn invalid_exclusion_pattern_rejected() {
        let mut cfg = Config::default();
        cfg.scan.exclude = vec![String::new()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let mut modified = Config::default();
        modified.scan.max_depth += 1;
        assert_ne!(cfg.stable_hash().unwrap(), modified.stable_hash().unwrap());
        assert_eq!(cfg.stable_hash().unwrap(), cfg.stable_hash().unwrap());
    }
}
