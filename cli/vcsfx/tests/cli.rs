//! Runs the built `vcsfx` binary and checks exit codes and files.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn command(dir: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_vcsfx"));
    command
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("VCSFX_CONFIG")
        .env_remove("VCSFX_OUTPUT_DIR")
        .env_remove("VCSFX_BUILD_PROGRAM")
        .env_remove("VCSFX_DEFAULT_VERSION")
        .env_remove("VCSFX_SURPLUS");
    command
}

fn vcsfx(dir: &Path, args: &[&str]) -> Output {
    command(dir, args).output().unwrap()
}

fn process_alive(pid: i32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .unwrap()
        .success()
}

#[test]
fn test_usage_errors_exit_2() {
    let dir = tempfile::tempdir().unwrap();
    for args in [
        &["rpm", "generate", "--valid", "standard"][..],
        &["rpm", "generate", "--story", "1"][..],
        &["rpm", "generate", "--story", "1", "--valid", "http", "--invalid", "fail"][..],
        &["rpm", "generate", "--story", "1", "--valid", "http", "--rpm-version", "1.0.0.0"][..],
    ] {
        let out = vcsfx(dir.path(), args);
        assert_eq!(out.status.code(), Some(2), "{args:?}");
    }
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_fixture_generate_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let out = vcsfx(
        dir.path(),
        &["fixture", "generate", "--story", "12", "--cs", "2", "--vips", "1", "--out", "f.json"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = vcsfx(dir.path(), &["--format", "json", "fixture", "validate", "f.json"]);
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["data"]["valid"], true);
}

#[test]
fn test_invalid_fixture_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.json"), "{}").unwrap();
    let out = vcsfx(dir.path(), &["fixture", "validate", "bad.json"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed validation"));
}

#[test]
fn test_failed_builds_exit_1_and_keep_sources() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("vcsfx.toml"), "build_program = \"false\"\n").unwrap();

    let out = vcsfx(
        dir.path(),
        &[
            "rpm", "generate", "--story", "55", "--valid", "standard", "--config", "vcsfx.toml",
            "--output-dir", "out",
        ],
    );

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("package build(s) failed"));
    let out_dir = dir.path().join("out");
    assert!(out_dir.join("setup.py").exists());
    assert!(out_dir.join("extr-lsbwrapper-55-1").exists());
    assert!(out_dir.join("extr-lsbwrapper-55-1.service").exists());
}

#[test]
fn test_version_prints_package_version() {
    let dir = tempfile::tempdir().unwrap();
    let out = vcsfx(dir.path(), &["version"]);
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        format!("vcsfx {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn test_output_dir_flag_beats_env_beats_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("vcsfx.toml"),
        "build_program = \"false\"\noutput_dir = \"from-file\"\n",
    )
    .unwrap();
    let base = ["rpm", "generate", "--story", "56", "--valid", "standard", "--config", "vcsfx.toml"];

    let out = vcsfx(dir.path(), &base);
    assert_eq!(out.status.code(), Some(1));
    assert!(dir.path().join("from-file/setup.py").exists());

    let out = command(dir.path(), &base)
        .env("VCSFX_OUTPUT_DIR", "from-env")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(dir.path().join("from-env/setup.py").exists());

    let mut args = base.to_vec();
    args.extend(["--output-dir", "from-flag"]);
    let out = command(dir.path(), &args)
        .env("VCSFX_OUTPUT_DIR", "from-env-again")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(dir.path().join("from-flag/setup.py").exists());
    assert!(!dir.path().join("from-env-again").exists());
}

#[test]
fn test_daemon_start_then_stop() {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().to_str().unwrap();

    let out = vcsfx(
        dir.path(),
        &[
            "daemon", "start", "--pidfile", "d.pid", "--log", "d.log", "--workdir", workdir, "--",
            "sleep", "30",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Daemon started"));

    let pidfile = dir.path().join("d.pid");
    let pid: i32 = fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();
    assert!(process_alive(pid));
    assert!(dir.path().join("d.log").exists());

    // a second start is refused while the first is alive
    let out = vcsfx(
        dir.path(),
        &["daemon", "start", "--pidfile", "d.pid", "--", "sleep", "30"],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("already_running"));

    let out = vcsfx(
        dir.path(),
        &["--format", "json", "daemon", "stop", "--pidfile", "d.pid", "--timeout", "10"],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["data"]["stopped"], true);
    assert_eq!(report["data"]["pid"], pid);
    assert!(!pidfile.exists());
    assert!(!process_alive(pid));
}

#[test]
fn test_daemon_start_with_missing_workdir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = vcsfx(
        dir.path(),
        &[
            "daemon", "start", "--pidfile", "d.pid", "--workdir", "/nonexistent/dir", "--",
            "sleep", "30",
        ],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("not_a_directory"));
    assert!(!String::from_utf8_lossy(&out.stdout).contains("Daemon started"));
    assert!(!dir.path().join("d.pid").exists());
}

#[test]
fn test_daemon_failure_after_fork_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let out = vcsfx(
        dir.path(),
        &["daemon", "start", "--pidfile", "missing/d.pid", "--", "sleep", "30"],
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("not_ready"));
    assert!(!String::from_utf8_lossy(&out.stdout).contains("Daemon started"));
}
