//! Integration tests: CLI smoke tests and full report scenarios driven through
//! the `pcov` binary.

mod common;

use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn json_line(stdout: &str) -> Value {
    let line = stdout
        .lines()
        .find(|l| l.trim_start().starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON line in stdout: {stdout}"));
    serde_json::from_str(line).expect("parse JSON output")
}

fn str_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string").to_string())
        .collect()
}

fn report_with_dumps(case: &str, out_dir: &Path, dumps: &[&Path], extra: &[&str]) -> Value {
    let out = out_dir.to_string_lossy().to_string();
    let mut args: Vec<String> = vec![
        "report".into(),
        "--json".into(),
        "--output-dir".into(),
        out,
    ];
    for dump in dumps {
        args.push("--dump".into());
        args.push(dump.to_string_lossy().to_string());
    }
    args.extend(extra.iter().map(|s| (*s).to_string()));
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

    let result = common::run_cli_case(case, &arg_refs);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    json_line(&result.stdout)
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains("Usage: pcov [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    assert!(
        result.stdout.contains(env!("CARGO_PKG_VERSION")),
        "missing version; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_subcommand_json_has_build_block() {
    let result = common::run_cli_case("version_subcommand_json", &["version", "--json"]);
    assert!(result.status.success());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["binary"], "pcov");
    assert!(payload["build"].is_object());
}

#[test]
fn single_run_half_covered() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("run_a/job_info");
    common::write_dump(&dump, &[("alpha", true), ("beta", false)]);

    let payload = report_with_dumps("single_run_half_covered", dir.path(), &[&dump], &[]);
    let full = &payload["outcome"]["full"];
    assert_eq!(str_list(&full["not_covered"]), vec!["beta"]);
    assert_eq!(full["covered_count"], 1);
    assert!((full["fractions"]["covered"].as_f64().unwrap() - 0.5).abs() < 1e-12);

    let body = fs::read_to_string(dir.path().join("coverage.out")).unwrap();
    assert!(body.contains("Coverage: 50.00%"), "{body}");
    assert!(body.contains("Number of parameters not covered: 1"), "{body}");
}

#[test]
fn override_in_one_run_covers_name_for_suite() {
    let dir = tempfile::tempdir().unwrap();
    let run1 = dir.path().join("run_1/job_info");
    let run2 = dir.path().join("run_2/job_info");
    common::write_dump(&run1, &[("alpha", true)]);
    common::write_dump(&run2, &[("alpha", false)]);

    let payload = report_with_dumps("override_covers_name", dir.path(), &[&run1, &run2], &[]);
    let outcome = &payload["outcome"];
    assert!(str_list(&outcome["full"]["not_covered"]).is_empty());
    assert_eq!(outcome["full"]["covered_count"], 1);
    assert!(str_list(&outcome["specific"]).is_empty());
    assert_eq!(outcome["runs_folded"], 2);
}

#[test]
fn name_in_one_run_is_specific() {
    let dir = tempfile::tempdir().unwrap();
    let run1 = dir.path().join("run_1/job_info");
    let run2 = dir.path().join("run_2/job_info");
    common::write_dump(&run1, &[("gamma", false), ("cfl", true)]);
    common::write_dump(&run2, &[("cfl", false)]);

    let payload = report_with_dumps("name_in_one_run_is_specific", dir.path(), &[&run1, &run2], &[]);
    let outcome = &payload["outcome"];
    assert_eq!(str_list(&outcome["specific"]), vec!["gamma"]);
    assert!(str_list(&outcome["nonspecific"]["not_covered"]).is_empty());
    assert_eq!(outcome["nonspecific"]["ignored_specific"], 1);

    let body = fs::read_to_string(dir.path().join("coverage_nonspecific.out")).unwrap();
    assert!(body.contains("Number of ignored problem specific parameters: 1"), "{body}");
    assert!(body.contains("Coverage: 100.00%"), "{body}");
}

#[test]
fn restart_row_never_reported() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("run/job_info");
    common::write_dump(&dump, &[("Restart", false), ("alpha", false)]);

    let payload = report_with_dumps("restart_row_never_reported", dir.path(), &[&dump], &[]);
    let full = &payload["outcome"]["full"];
    assert_eq!(str_list(&full["not_covered"]), vec!["alpha"]);
    assert_eq!(full["covered_count"], 0);
    let body = fs::read_to_string(dir.path().join("coverage.out")).unwrap();
    assert!(!body.contains("Restart"), "{body}");
}

#[test]
fn empty_root_reports_zero_coverage() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("suite");
    fs::create_dir_all(&root).unwrap();
    let root_arg = root.to_string_lossy().to_string();
    let out_arg = dir.path().join("reports").to_string_lossy().to_string();

    let result = common::run_cli_case(
        "empty_root_reports_zero_coverage",
        &["report", "--json", "--root", &root_arg, "--output-dir", &out_arg],
    );
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
    let payload = json_line(&result.stdout);
    assert_eq!(payload["outcome"]["runs_folded"], 0);
    assert_eq!(payload["outcome"]["full"]["covered_count"], 0);
    assert_eq!(payload["outcome"]["full"]["not_covered_count"], 0);

    for name in ["coverage.out", "coverage_nonspecific.out"] {
        let body = fs::read_to_string(dir.path().join("reports").join(name)).unwrap();
        assert!(body.contains("Coverage: 0.00%"), "{body}");
        assert!(body.contains("Total number of parameters: 0"), "{body}");
    }
}

#[test]
fn reports_land_in_root_not_cwd() {
    let home = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("suite");
    fs::create_dir_all(&root).unwrap();
    let root_arg = root.to_string_lossy().to_string();

    let result = common::run_cli_case_at(
        "reports_land_in_root_not_cwd",
        home.path(),
        Some(cwd.path()),
        &["report", "--json", "--root", &root_arg],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let payload = json_line(&result.stdout);
    let full = payload["reports"]["full"].as_str().unwrap();
    assert!(Path::new(full).ends_with("suite/coverage.out"), "{full}");
    for name in ["coverage.out", "coverage_nonspecific.out"] {
        assert!(root.join(name).is_file(), "{name} missing under root");
        assert!(!cwd.path().join(name).exists(), "{name} leaked into cwd");
    }
}

#[test]
fn malformed_dump_fails_batch_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good/job_info");
    let bad = dir.path().join("bad/job_info");
    common::write_dump(&good, &[("alpha", true)]);
    fs::create_dir_all(bad.parent().unwrap()).unwrap();
    fs::write(&bad, "simulation aborted before writing parameters\n").unwrap();

    let out_arg = dir.path().to_string_lossy().to_string();
    let good_arg = good.to_string_lossy().to_string();
    let bad_arg = bad.to_string_lossy().to_string();
    let result = common::run_cli_case(
        "malformed_dump_fails_batch",
        &[
            "report", "--output-dir", &out_arg, "--dump", &good_arg, "--dump", &bad_arg,
        ],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("PCOV-2001"), "{}", result.stderr);
    assert!(result.stderr.contains("bad/job_info"), "{}", result.stderr);
    assert!(!dir.path().join("coverage.out").exists());
}

#[test]
fn malformed_dump_excluded_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good/job_info");
    let bad = dir.path().join("bad/job_info");
    common::write_dump(&good, &[("alpha", true)]);
    fs::create_dir_all(bad.parent().unwrap()).unwrap();
    fs::write(&bad, "no table\n").unwrap();

    let payload = report_with_dumps(
        "malformed_dump_excluded",
        dir.path(),
        &[&good, &bad],
        &["--on-malformed", "exclude"],
    );
    let excluded = payload["outcome"]["excluded_runs"].as_array().unwrap();
    assert_eq!(excluded.len(), 1);
    assert!(excluded[0]["label"].as_str().unwrap().ends_with("bad/job_info"));
    assert_eq!(payload["outcome"]["runs_folded"], 1);

    let body = fs::read_to_string(dir.path().join("coverage.out")).unwrap();
    assert!(body.contains("Number of runs excluded (malformed dumps): 1"), "{body}");
}

#[test]
fn parse_command_lists_classification() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("job_info");
    common::write_dump(&dump, &[("max_levels", true), ("cfl", false)]);
    let dump_arg = dump.to_string_lossy().to_string();

    let result = common::run_cli_case("parse_command", &["parse", "--json", &dump_arg]);
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let payload = json_line(&result.stdout);
    assert_eq!(payload["command"], "parse");
    assert_eq!(str_list(&payload["covered"]), vec!["max_levels"]);
    assert_eq!(str_list(&payload["not_covered"]), vec!["cfl"]);
}

#[test]
fn activity_log_records_batch_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("run/job_info");
    common::write_dump(&dump, &[("alpha", true)]);
    let dump_arg = dump.to_string_lossy().to_string();
    let out_arg = dir.path().to_string_lossy().to_string();

    let result = common::run_cli_case_in(
        "activity_log_records_batch_lifecycle",
        home.path(),
        &["report", "-q", "--output-dir", &out_arg, "--dump", &dump_arg],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let log = home.path().join(".local/share/pcov/activity.jsonl");
    let events: Vec<String> = fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(|line| {
            let v: Value = serde_json::from_str(line).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        events,
        vec![
            "batch_start",
            "run_parsed",
            "report_written",
            "report_written",
            "batch_complete"
        ]
    );
}

#[test]
fn json_report_describes_activity_log() {
    let home = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("run/job_info");
    common::write_dump(&dump, &[("alpha", true), ("beta", false)]);
    let dump_arg = dump.to_string_lossy().to_string();
    let out_arg = dir.path().to_string_lossy().to_string();

    let result = common::run_cli_case_in(
        "json_report_describes_activity_log",
        home.path(),
        &["report", "--json", "--output-dir", &out_arg, "--dump", &dump_arg],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let payload = json_line(&result.stdout);
    let log = &payload["activity_log"];
    assert_eq!(log["state"], "file");
    assert_eq!(log["lines"], 5);
    let path = log["path"].as_str().unwrap();
    assert!(path.ends_with("pcov/activity.jsonl"), "{path}");
    assert_eq!(
        fs::read_to_string(path).unwrap().lines().count(),
        5,
        "log lines should match the reported count"
    );
}

#[test]
fn config_show_prints_effective_toml() {
    let result = common::run_cli_case(
        "config_show_prints_effective_toml",
        &["config", "show"],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());
    let parsed: toml::Value = toml::from_str(&result.stdout).expect("config show emits TOML");
    assert_eq!(parsed["analysis"]["on_malformed"].as_str(), Some("fail"));
    assert!(parsed["report"].get("output_dir").is_none());
}

#[test]
fn config_validate_rejects_bad_toml() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("pcov.toml");
    fs::write(&cfg, "[analysis]\non_malformed = \"sometimes\"\n").unwrap();
    let cfg_arg = cfg.to_string_lossy().to_string();

    let result = common::run_cli_case(
        "config_validate_rejects_bad_toml",
        &["config", "validate", "--config", &cfg_arg],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
}

#[test]
fn explicit_missing_config_is_user_error() {
    let result = common::run_cli_case(
        "explicit_missing_config",
        &["report", "--config", "/nonexistent/pcov.toml"],
    );
    assert_eq!(result.status.code(), Some(1), "log: {}", result.log_path.display());
    assert!(result.stderr.contains("PCOV-1002"), "{}", result.stderr);
}

#[test]
fn archives_under_root_are_extracted_and_cleaned() {
    let tar_ok = Command::new("tar")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success());
    if !tar_ok {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("suite");
    for (run, stem, rows) in [
        ("bubble", "bubble_plt00005", vec![("alpha", true), ("beta", false)]),
        ("sedov", "sedov_plt00010", vec![("alpha", false), ("beta", false)]),
    ] {
        let build = tempfile::tempdir().unwrap();
        common::write_dump(&build.path().join(stem).join("job_info"), &rows);
        fs::create_dir_all(root.join(run)).unwrap();
        let status = Command::new("tar")
            .arg("-czf")
            .arg(root.join(run).join(format!("{stem}.tgz")))
            .arg("-C")
            .arg(build.path())
            .arg(stem)
            .status()
            .unwrap();
        assert!(status.success());
    }

    let root_arg = root.to_string_lossy().to_string();
    let out_arg = dir.path().join("reports").to_string_lossy().to_string();
    let result = common::run_cli_case(
        "archives_under_root",
        &["report", "--json", "--root", &root_arg, "--output-dir", &out_arg],
    );
    assert!(result.status.success(), "log: {}", result.log_path.display());

    let payload = json_line(&result.stdout);
    assert_eq!(payload["outcome"]["runs_folded"], 2);
    assert_eq!(str_list(&payload["outcome"]["full"]["not_covered"]), vec!["beta"]);
    assert_eq!(payload["cleanup"], "removed");
    assert!(!root.join(".pcov-staging").exists());
}
