//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use param_coverage::batch::extract::CleanupStatus;
use param_coverage::batch::pipeline::{BatchRun, RunInput, run_batch, run_files};
use param_coverage::core::config::{Config, MalformedPolicy};
use param_coverage::core::errors::PcovError;
use param_coverage::coverage::report::CoverageReport;
use param_coverage::dump::classifier::classify;
use param_coverage::dump::parser::parse_dump;
use param_coverage::logger::jsonl::JsonlWriter;

/// Parameter coverage analyzer for simulation regression suites.
#[derive(Debug, Parser)]
#[command(
    name = "pcov",
    author,
    version,
    about = "Parameter coverage analyzer for regression suites",
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
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Analyze a suite and write both coverage reports.
    Report(ReportArgs),
    /// Classify the parameters of a single dump.
    Parse(ParseArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MalformedArg {
    Fail,
    Exclude,
}

impl From<MalformedArg> for MalformedPolicy {
    fn from(value: MalformedArg) -> Self {
        match value {
            MalformedArg::Fail => Self::Fail,
            MalformedArg::Exclude => Self::Exclude,
        }
    }
}

#[derive(Debug, Clone, Args, Default)]
struct ReportArgs {
    /// Working root holding one directory per run.
    #[arg(long, value_name = "DIR", conflicts_with = "dumps")]
    root: Option<PathBuf>,
    /// Analyze these dump files directly instead of discovering archives.
    #[arg(long = "dump", value_name = "FILE")]
    dumps: Vec<PathBuf>,
    /// Directory the two reports are written to [default: the work root].
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Only analyze run directories whose name matches this regex.
    #[arg(long, value_name = "REGEX", conflicts_with = "dumps")]
    filter: Option<String>,
    /// What to do with a dump that has no parameter table.
    #[arg(long, value_enum, value_name = "POLICY")]
    on_malformed: Option<MalformedArg>,
    /// Worker threads for per-run parsing.
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,
    /// Leave extracted dumps in the staging directory.
    #[arg(long)]
    keep_extracted: bool,
}

#[derive(Debug, Clone, Args)]
struct ParseArgs {
    /// Dump file to classify.
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
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
    /// Invalid user input or suite data.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// Operation partially succeeded.
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

impl From<PcovError> for CliError {
    fn from(err: PcovError) -> Self {
        match err {
            PcovError::InvalidConfig { .. }
            | PcovError::MissingConfig { .. }
            | PcovError::ConfigParse { .. }
            | PcovError::MalformedDump { .. } => Self::User(err.to_string()),
            PcovError::Serialization { .. } => Self::Internal(err.to_string()),
            PcovError::Extraction { .. }
            | PcovError::Io { .. }
            | PcovError::ChannelClosed { .. } => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Report(args) => run_report(cli, args),
        Command::Parse(args) => run_parse(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

/// Fold command-line overrides into the loaded configuration.
fn apply_report_overrides(config: &mut Config, args: &ReportArgs) -> Result<(), CliError> {
    if let Some(root) = &args.root {
        config.discovery.work_root.clone_from(root);
    }
    if let Some(dir) = &args.output_dir {
        config.report.output_dir = Some(dir.clone());
    }
    if let Some(filter) = &args.filter {
        config.discovery.run_filter = Some(filter.clone());
    }
    if let Some(policy) = args.on_malformed {
        config.analysis.on_malformed = policy.into();
    }
    if let Some(jobs) = args.jobs {
        if jobs == 0 {
            return Err(CliError::User("--jobs must be at least 1".to_string()));
        }
        config.analysis.parallelism = jobs;
    }
    if args.keep_extracted {
        config.discovery.keep_extracted = true;
    }
    Ok(())
}

fn run_report(cli: &Cli, args: &ReportArgs) -> Result<(), CliError> {
    let mut config = load_config(cli)?;
    apply_report_overrides(&mut config, args)?;

    if cli.verbose {
        eprintln!("pcov: config {}", config.paths.config_file.display());
        if args.dumps.is_empty() {
            eprintln!(
                "pcov: scanning {} for *.{} archives",
                config.discovery.work_root.display(),
                config.discovery.archive_extension
            );
        }
    }

    let mut log = JsonlWriter::open(&config.paths.jsonl_log);
    let batch = if args.dumps.is_empty() {
        run_batch(&config, &mut log)?
    } else {
        run_files(&args.dumps, &config, &mut log)?
    };

    match output_mode(cli) {
        OutputMode::Human => {
            print_report_summary(cli, &batch);
            if cli.verbose {
                eprintln!(
                    "pcov: activity log {} ({}, {} lines)",
                    log.path().map_or_else(|| "-".to_string(), |p| p.display().to_string()),
                    log.state(),
                    log.lines_written()
                );
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "report",
                "outcome": serde_json::to_value(&batch.outcome)?,
                "reports": serde_json::to_value(&batch.reports)?,
                "cleanup": batch.cleanup.as_str(),
                "activity_log": {
                    "path": log.path().map(|p| p.to_string_lossy().into_owned()),
                    "state": log.state(),
                    "lines": log.lines_written(),
                },
            });
            write_json_line(&payload)?;
        }
    }

    if let CleanupStatus::Failed(message) = &batch.cleanup {
        return Err(CliError::Partial(format!(
            "reports written but staging cleanup failed: {message}"
        )));
    }
    Ok(())
}

fn coverage_line(label: &str, report: &CoverageReport) -> String {
    let percent = format!("{:.2}%", report.fractions.covered_percent());
    let styled = if report.not_covered_count == 0 {
        percent.green().bold()
    } else {
        percent.yellow().bold()
    };
    format!(
        "{label}: {styled} ({} of {} parameters covered)",
        report.covered_count,
        report.total()
    )
}

fn print_report_summary(cli: &Cli, batch: &BatchRun) {
    let outcome = &batch.outcome;
    for excluded in &outcome.excluded_runs {
        if !cli.quiet {
            eprintln!(
                "{} excluded {}: {}",
                "warning:".yellow().bold(),
                excluded.label,
                excluded.reason
            );
        }
    }
    if cli.quiet {
        return;
    }

    println!(
        "Runs analyzed: {} (excluded: {})",
        outcome.runs_folded,
        outcome.excluded_runs.len()
    );
    println!("{}", coverage_line("Full coverage", &outcome.full));
    println!(
        "{}, {} run-specific ignored",
        coverage_line("Nonspecific coverage", &outcome.nonspecific),
        outcome.specific.len()
    );
    println!("Reports:");
    println!("  {}", batch.reports.full.display());
    println!("  {}", batch.reports.nonspecific.display());
    if cli.verbose {
        println!("Staging cleanup: {}", batch.cleanup.as_str());
    }
}

fn run_parse(cli: &Cli, args: &ParseArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let label = args.file.display().to_string();
    let input = RunInput::read(&label, &args.file)?;
    let dump = parse_dump(&input.label, &input.text, &config.analysis.dump_format())?;
    let run = classify(&dump);

    match output_mode(cli) {
        OutputMode::Human => {
            println!("{}", run.label.bold());
            println!("covered ({}):", run.covered.len());
            for name in &run.covered {
                println!("  {}", name.green());
            }
            println!("not covered ({}):", run.not_covered.len());
            for name in &run.not_covered {
                println!("  {name}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "parse",
                "label": run.label,
                "covered": run.covered,
                "not_covered": run.not_covered,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

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
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = load_config(cli)?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config).map_err(PcovError::from)?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
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
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error": e.to_string(),
                            "code": e.code(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("pcov {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "pcov",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("PCOV_OUTPUT_FORMAT").ok();
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
