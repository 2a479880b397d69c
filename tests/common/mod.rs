#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

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
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_pcov") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "pcov.exe" } else { "pcov" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve pcov binary path for integration test"),
    }
}

/// Run the binary with an isolated HOME so no user config leaks in.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let home = tempfile::tempdir().expect("create isolated HOME");
    run_cli_case_in(case_name, home.path(), args)
}

/// Run the binary with `home` as HOME; the activity log lands under it.
pub fn run_cli_case_in(case_name: &str, home: &Path, args: &[&str]) -> CmdResult {
    run_cli_case_at(case_name, home, None, args)
}

/// Like `run_cli_case_in`, but starts the binary in `cwd` when given.
pub fn run_cli_case_at(
    case_name: &str,
    home: &Path,
    cwd: Option<&Path>,
    args: &[&str],
) -> CmdResult {
    let root = std::env::temp_dir().join("pcov-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let output = command
        .args(args)
        .env("HOME", home)
        .env_remove("PCOV_OUTPUT_FORMAT")
        .env_remove("PCOV_WORK_ROOT")
        .env_remove("PCOV_OUTPUT_DIR")
        .env_remove("PCOV_ON_MALFORMED")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute pcov command");

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

/// Write a dump whose table holds `rows`, each `(name, overridden)`.
pub fn write_dump(path: &Path, rows: &[(&str, bool)]) {
    let mut text = String::from(
        "Job Information\n\
         ===============================================================================\n \
         Runtime Parameter Information\n\
         ===============================================================================\n \
         [*] indicates overridden default\n",
    );
    for (name, overridden) in rows {
        let marker = if *overridden { "[*]" } else { "   " };
        text.push_str(&format!(" {marker} {name:>24} = 1\n"));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dump dir");
    }
    fs::write(path, text).expect("write dump");
}
