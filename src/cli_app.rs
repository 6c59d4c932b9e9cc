//! Top-level CLI definition and dispatch.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use appsweep::core::config::Config;
use appsweep::core::errors::SweepError;
use appsweep::core::paths::resolve_absolute_path;
use appsweep::logger::activity::{ActivityEvent, ActivityLog};
use appsweep::scanner::deletion::{DeletionReport, DeletionStatus, kind_label};
use appsweep::scanner::locator::{AppName, BundleMatch, Location};
use appsweep::scanner::protection::Verdict;
use appsweep::scanner::walker::{Artifact, ScanReport, disk_usage};
use appsweep::uninstall::Uninstaller;

/// appsweep: remove a desktop application and the files it left behind.
#[derive(Debug, Parser)]
#[command(
    name = "appsweep",
    author,
    version,
    about = "Remove an application and its leftover support files",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Print lookup and scan diagnostics to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (summary and errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Do not write the activity log.
    #[arg(long, global = true)]
    no_log: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Find an application's artifacts and delete the safe ones.
    Uninstall(UninstallArgs),
    /// Find an application's artifacts without deleting anything.
    Scan(ScanArgs),
    /// Show whether paths may be deleted, and which rule decided.
    Classify(ClassifyArgs),
    /// View configuration state.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct UninstallArgs {
    /// Application name, with or without the bundle suffix.
    #[arg(value_name = "APP")]
    app: String,
    /// List what would be deleted, then stop.
    #[arg(long)]
    dry_run: bool,
    /// Skip the confirmation prompt.
    #[arg(short, long)]
    yes: bool,
    /// Extra exclusion pattern (path fragment or base-name glob). Repeatable.
    #[arg(long, value_name = "PATTERN")]
    exclude: Vec<String>,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ScanArgs {
    /// Application name, with or without the bundle suffix.
    #[arg(value_name = "APP")]
    app: String,
    /// Extra exclusion pattern (path fragment or base-name glob). Repeatable.
    #[arg(long, value_name = "PATTERN")]
    exclude: Vec<String>,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ClassifyArgs {
    /// Paths to classify. Relative paths are resolved against the current directory.
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args, Serialize, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Some artifacts could not be deleted.
    #[error("{0}")]
    Partial(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
            Self::Partial(_) => 4,
        }
    }
}

impl From<SweepError> for CliError {
    fn from(err: SweepError) -> Self {
        match err {
            SweepError::InvalidConfig { .. }
            | SweepError::MissingConfig { .. }
            | SweepError::ConfigParse { .. }
            | SweepError::InvalidArgument { .. } => Self::User(err.to_string()),
            SweepError::Serialization { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Uninstall(args) => run_uninstall(cli, args),
        Command::Scan(args) => run_scan(cli, args),
        Command::Classify(args) => run_classify(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── uninstall ────────────────────

/// One artifact as shown before confirmation.
#[derive(Debug, Clone, Serialize)]
struct PlanEntry {
    path: PathBuf,
    kind: &'static str,
    size_bytes: u64,
    deletable: bool,
    rule: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    root: Option<PathBuf>,
}

fn build_plan(sweeper: &Uninstaller, artifacts: &[Artifact]) -> Vec<PlanEntry> {
    artifacts
        .iter()
        .map(|artifact| {
            let verdict = sweeper.classifier().explain(&artifact.path);
            PlanEntry {
                path: artifact.path.clone(),
                kind: kind_label(artifact.kind),
                size_bytes: disk_usage(&artifact.path),
                deletable: verdict.is_deletable(),
                rule: verdict.rule(),
                root: verdict.root().map(Path::to_path_buf),
            }
        })
        .collect()
}

fn run_uninstall(cli: &Cli, args: &UninstallArgs) -> Result<(), CliError> {
    let started = Instant::now();
    let mut config = load_config(cli)?;
    config.scan.exclude.extend(args.exclude.iter().cloned());
    config.validate()?;

    let sweeper = Uninstaller::from_config(&config)?;
    let name = sweeper.app_name(&args.app)?;
    let mut log = open_activity_log(cli, &config);
    let config_hash = config.stable_hash()?;
    log.record(&ActivityEvent::SessionStart {
        app: name.as_str(),
        config_hash: &config_hash,
        dry_run: args.dry_run,
    });

    let (location, scan) = locate_and_scan(cli, &sweeper, &name, &mut log);
    let plan = build_plan(&sweeper, &scan.artifacts);
    let mode = output_mode(cli);

    if mode == OutputMode::Human {
        render_identity_human(cli, &location);
        render_plan_human(cli, &plan, &scan);
    }

    if scan.artifacts.is_empty() || args.dry_run {
        if mode == OutputMode::Json {
            write_json_line(&json!({
                "command": "uninstall",
                "dry_run": args.dry_run,
                "identity": location.identity,
                "plan": plan,
                "access_errors": scan.access_errors,
                "report": Value::Null,
            }))?;
        } else if scan.artifacts.is_empty() {
            println!("Nothing found for {}.", name.as_str().bold());
        } else {
            println!("Dry run: nothing was deleted.");
        }
        log.flush();
        return Ok(());
    }

    if !args.yes {
        if !io::stdin().is_terminal() {
            let err = SweepError::InvalidArgument {
                details: "refusing to delete without confirmation: stdin is not a terminal \
                          (pass --yes)"
                    .to_string(),
            };
            return Err(record_failure(&mut log, err));
        }
        let deletable = plan.iter().filter(|p| p.deletable).count();
        eprint!(
            "Delete {deletable} of {} artifact(s) for {}? [y/N] ",
            plan.len(),
            name.as_str()
        );
        io::stderr().flush()?;
        let mut input = String::new();
        io::stdin()
            .lock()
            .read_line(&mut input)
            .map_err(|e| CliError::Runtime(e.to_string()))?;
        if !is_affirmative(&input) {
            eprintln!("Aborted; nothing was deleted.");
            log.flush();
            return Ok(());
        }
    }

    let report = match sweeper.delete(&scan.artifacts, Some(&mut log)) {
        Ok(report) => report,
        Err(err) => return Err(record_failure(&mut log, err)),
    };
    log.record(&ActivityEvent::SessionComplete {
        app: name.as_str(),
        deleted: report.deleted_count,
        skipped: report.skipped_unsafe_count() + report.skipped_missing_count(),
        failed: report.failed_count(),
        duration: started.elapsed(),
    });
    log.flush();

    match mode {
        OutputMode::Human => render_report_human(cli, &report),
        OutputMode::Json => write_json_line(&json!({
            "command": "uninstall",
            "dry_run": false,
            "identity": location.identity,
            "plan": plan,
            "access_errors": scan.access_errors,
            "report": report_json(&report),
        }))?,
    }

    if report.has_failures() {
        return Err(CliError::Partial(format!(
            "{} of {} artifact(s) could not be deleted",
            report.failed_count(),
            report.outcomes.len()
        )));
    }
    Ok(())
}

/// Log a session-ending error, then hand it back for the exit code.
fn record_failure(log: &mut ActivityLog, err: SweepError) -> CliError {
    log.record(&ActivityEvent::Error {
        code: err.code(),
        message: err.to_string(),
    });
    log.flush();
    err.into()
}

fn locate_and_scan(
    cli: &Cli,
    sweeper: &Uninstaller,
    name: &AppName,
    log: &mut ActivityLog,
) -> (Location, ScanReport) {
    let location = sweeper.locate(name);

    if cli.verbose {
        for probe in &location.probed {
            eprintln!("probe: {}", probe.display());
        }
    }
    if let Some(bundle) = &location.bundle {
        log.record(&ActivityEvent::BundleLocated {
            app: name.as_str(),
            path: &bundle.path,
            kind: bundle_match_label(location.bundle_match),
            identifier: location.identity.identifier.as_deref(),
        });
    }
    if let Some(err) = &location.manifest_error {
        let reported = SweepError::from(err.clone());
        log.record(&ActivityEvent::ManifestParseFailed {
            path: err.manifest_path(),
            message: reported.to_string(),
        });
        if !cli.quiet {
            eprintln!("{} {reported}", "warning:".yellow());
        }
    }

    let scan_started = Instant::now();
    let scan = sweeper.scan(&location);
    for err in &scan.access_errors {
        log.record(&ActivityEvent::AccessError {
            path: &err.path,
            code: err.code,
            message: &err.message,
        });
    }
    log.record(&ActivityEvent::ScanComplete {
        app: name.as_str(),
        artifacts: scan.artifacts.len(),
        access_errors: scan.access_errors.len(),
        duration: scan_started.elapsed(),
    });

    if cli.verbose {
        for root in &scan.missing_roots {
            eprintln!("missing root: {}", root.display());
        }
        eprintln!(
            "visited {} entries, excluded {}, {} directories at max depth",
            scan.entries_visited, scan.excluded, scan.depth_limited
        );
    }
    (location, scan)
}

fn bundle_match_label(bundle_match: Option<BundleMatch>) -> &'static str {
    match bundle_match {
        Some(BundleMatch::Canonical) => "canonical",
        Some(BundleMatch::BareDirectory) => "bare_directory",
        None => "none",
    }
}

fn render_identity_human(cli: &Cli, location: &Location) {
    if cli.quiet {
        return;
    }
    let identity = &location.identity;
    match &location.bundle {
        Some(bundle) => println!(
            "{} {} ({})",
            "Bundle:".bold(),
            bundle.path.display(),
            bundle_match_label(location.bundle_match)
        ),
        None => println!("{} not found in any install root", "Bundle:".bold()),
    }
    match &identity.identifier {
        Some(id) => println!("{} {id} ({:?})", "Identifier:".bold(), identity.identifier_source),
        None => println!("{} unknown", "Identifier:".bold()),
    }
}

fn render_plan_human(cli: &Cli, plan: &[PlanEntry], scan: &ScanReport) {
    if cli.quiet || plan.is_empty() {
        return;
    }
    println!();
    println!("{}", "Artifacts:".bold());
    for entry in plan {
        let verdict = if entry.deletable {
            "delete".green()
        } else {
            format!("keep ({})", entry.rule).yellow()
        };
        println!(
            "  {:>10}  {:<9}  {}  {}",
            format_bytes(entry.size_bytes),
            entry.kind,
            verdict,
            entry.path.display()
        );
    }
    let total: u64 = plan
        .iter()
        .filter(|p| p.deletable)
        .map(|p| p.size_bytes)
        .sum();
    println!("  total reclaimable: {}", format_bytes(total));
    for err in &scan.access_errors {
        eprintln!("{} {}: {}", "unreadable:".yellow(), err.path.display(), err.message);
    }
    println!();
}

fn render_report_human(cli: &Cli, report: &DeletionReport) {
    if !cli.quiet {
        for outcome in &report.outcomes {
            let status = match outcome.status {
                DeletionStatus::Deleted => "deleted".green(),
                DeletionStatus::SkippedUnsafe => "kept".yellow(),
                DeletionStatus::SkippedMissing => "gone".dimmed(),
                DeletionStatus::Failed => "FAILED".red().bold(),
            };
            match &outcome.error {
                Some(err) => println!("  {status:<8} {} ({})", outcome.path.display(), err.message),
                None => println!("  {status:<8} {}", outcome.path.display()),
            }
        }
    }
    println!(
        "Deleted {}, skipped {} unsafe, {} already gone, {} failed in {}.",
        report.deleted_count,
        report.skipped_unsafe_count(),
        report.skipped_missing_count(),
        report.failed_count(),
        format_duration(report.duration)
    );
}

fn report_json(report: &DeletionReport) -> Value {
    json!({
        "deleted": report.deleted_count,
        "skipped_unsafe": report.skipped_unsafe_count(),
        "skipped_missing": report.skipped_missing_count(),
        "failed": report.failed_count(),
        "duration_ms": u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        "outcomes": report.outcomes,
    })
}

fn is_affirmative(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

// ──────────────────── scan ────────────────────

fn run_scan(cli: &Cli, args: &ScanArgs) -> Result<(), CliError> {
    let mut config = load_config(cli)?;
    config.scan.exclude.extend(args.exclude.iter().cloned());
    config.validate()?;

    let sweeper = Uninstaller::from_config(&config)?;
    let name = sweeper.app_name(&args.app)?;
    let mut log = ActivityLog::disabled();
    let (location, scan) = locate_and_scan(cli, &sweeper, &name, &mut log);

    match output_mode(cli) {
        OutputMode::Human => {
            render_identity_human(cli, &location);
            if scan.artifacts.is_empty() {
                println!("No artifacts found.");
            }
            for artifact in &scan.artifacts {
                println!("  {:<9}  {}", kind_label(artifact.kind), artifact.path.display());
            }
            for err in &scan.access_errors {
                eprintln!("{} {}: {}", "unreadable:".yellow(), err.path.display(), err.message);
            }
        }
        OutputMode::Json => write_json_line(&json!({
            "command": "scan",
            "identity": location.identity,
            "bundle_match": location.bundle_match,
            "manifest_error": location.manifest_error.as_ref().map(ToString::to_string),
            "probed": location.probed,
            "scan": scan,
        }))?,
    }
    Ok(())
}

// ──────────────────── classify ────────────────────

fn run_classify(cli: &Cli, args: &ClassifyArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let sweeper = Uninstaller::from_config(&config)?;

    let rows: Vec<(PathBuf, Verdict)> = args
        .paths
        .iter()
        .map(|raw| {
            let path = if raw.is_absolute() {
                raw.clone()
            } else {
                resolve_absolute_path(raw)
            };
            let verdict = sweeper.classifier().explain(&path);
            (path, verdict)
        })
        .collect();

    match output_mode(cli) {
        OutputMode::Human => {
            for (path, verdict) in &rows {
                let label = if verdict.is_deletable() {
                    "deletable".green()
                } else {
                    "protected".red()
                };
                match verdict.root() {
                    Some(root) => println!(
                        "{label:<10} {}  [{} root {}]",
                        path.display(),
                        verdict.rule(),
                        root.display()
                    ),
                    None => println!("{label:<10} {}  [{}]", path.display(), verdict.rule()),
                }
            }
        }
        OutputMode::Json => {
            let results: Vec<Value> = rows
                .iter()
                .map(|(path, verdict)| {
                    json!({
                        "path": path,
                        "deletable": verdict.is_deletable(),
                        "rule": verdict.rule(),
                        "root": verdict.root(),
                    })
                })
                .collect();
            write_json_line(&json!({ "command": "classify", "results": results }))?;
        }
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    write_json_line(&json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    }))?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;
                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        write_json_line(&json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        }))?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => eprintln!("Configuration is INVALID: {e}"),
                    OutputMode::Json => write_json_line(&json!({
                        "command": "config validate",
                        "valid": false,
                        "error": e.to_string(),
                        "code": e.code(),
                    }))?,
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── helpers ────────────────────

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn open_activity_log(cli: &Cli, config: &Config) -> ActivityLog {
    if cli.no_log {
        ActivityLog::disabled()
    } else {
        ActivityLog::open(&config.paths.activity_log)
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    if bytes >= GIB {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        format!("{millis}ms")
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("APPSWEEP_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
