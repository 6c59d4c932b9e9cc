#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use appsweep::core::config::Config;
use tempfile::TempDir;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_appsweep") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "appsweep.exe"
    } else {
        "appsweep"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve appsweep binary path for integration test"),
    }
}

const SCRUBBED_ENV: [&str; 6] = [
    "APPSWEEP_HOME",
    "APPSWEEP_ACTIVITY_LOG",
    "APPSWEEP_SCAN_MAX_DEPTH",
    "APPSWEEP_SCAN_FOLLOW_SYMLINKS",
    "APPSWEEP_SCAN_EXCLUDE",
    "APPSWEEP_OUTPUT_FORMAT",
];

/// Run the binary with a clean `APPSWEEP_*` environment plus `env`.
/// Stdin is closed, so any confirmation prompt sees a non-terminal.
pub fn run_cli_case(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let root = std::env::temp_dir().join("appsweep-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .stdin(std::process::Stdio::null())
        .env("RUST_BACKTRACE", "1");
    for name in SCRUBBED_ENV {
        command.env_remove(name);
    }
    for (name, value) in env {
        command.env(name, value);
    }
    let output = command.output().expect("execute appsweep command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// A throwaway machine layout inside a temp dir:
///
/// ```text
/// <tmp>/System        configured critical root
/// <tmp>/Applications  configured system install root
/// <tmp>/home          home directory (Library/..., Documents, Applications)
/// ```
///
/// Only the fixture's own critical root is configured, so the real temp dir
/// location (e.g. under /var on macOS) never trips the default critical list.
pub struct Fixture {
    pub dir: TempDir,
    pub home: PathBuf,
    pub system: PathBuf,
    pub apps: PathBuf,
    pub config_path: PathBuf,
    pub activity_log: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create fixture dir");
        let root = dir.path().to_path_buf();
        let fixture = Self {
            home: root.join("home"),
            system: root.join("System"),
            apps: root.join("Applications"),
            config_path: root.join("config.toml"),
            activity_log: root.join("logs/activity.jsonl"),
            dir,
        };
        fs::create_dir_all(&fixture.home).expect("create home");
        fs::create_dir_all(&fixture.system).expect("create system");
        fs::create_dir_all(&fixture.apps).expect("create apps");
        fixture
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.roots.critical = vec![self.system.clone()];
        config.roots.system_install_roots = vec![self.apps.clone()];
        config.paths.home = Some(self.home.clone());
        config.paths.activity_log = self.activity_log.clone();
        config.paths.config_file = self.config_path.clone();
        config
    }

    /// Write `config()` to `config_path` and return the path as a string arg.
    pub fn write_config(&self) -> String {
        let raw = toml::to_string(&self.config()).expect("serialize config");
        fs::write(&self.config_path, raw).expect("write config");
        self.config_path.to_string_lossy().into_owned()
    }

    pub fn library(&self, rel: &str) -> PathBuf {
        self.home.join("Library").join(rel)
    }

    pub fn touch(&self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, b"fixture").expect("write fixture file");
        path.to_path_buf()
    }

    pub fn mkdir(&self, path: &Path) -> PathBuf {
        fs::create_dir_all(path).expect("create fixture dir");
        path.to_path_buf()
    }

    /// `<root>/<file_name>` with `Contents/Info.plist` carrying `identifier`.
    pub fn bundle(&self, root: &Path, file_name: &str, identifier: Option<&str>) -> PathBuf {
        let bundle = root.join(file_name);
        fs::create_dir_all(bundle.join("Contents/MacOS")).expect("create bundle");
        self.touch(&bundle.join("Contents/MacOS/binary"));
        if let Some(id) = identifier {
            let mut dict = plist::Dictionary::new();
            dict.insert(
                "CFBundleIdentifier".to_string(),
                plist::Value::String(id.to_string()),
            );
            plist::Value::Dictionary(dict)
                .to_file_xml(bundle.join("Contents/Info.plist"))
                .expect("write Info.plist");
        }
        bundle
    }
}
