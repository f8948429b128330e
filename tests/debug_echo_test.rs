#![cfg(not(windows))]
use predicates::str::contains;
use std::path::Path;
use tempfile::tempdir;

fn build_id_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("build-id");
    cmd.env_clear()
        .env("PATH", std::env::var_os("PATH").unwrap_or_default())
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .current_dir(home);
    cmd
}

#[test]
fn debug_echo_only_touches_stderr() {
    let tmp = tempdir().expect("tempdir");

    let quiet = build_id_cmd(tmp.path())
        .env("CFLAGS", "-O2")
        .arg("my-salt")
        .assert()
        .success();
    let quiet_out = quiet.get_output();
    assert!(quiet_out.stderr.is_empty(), "default run wrote to stderr");

    let noisy = build_id_cmd(tmp.path())
        .env("CFLAGS", "-O2")
        .env("DEBUG", "1")
        .arg("my-salt")
        .assert()
        .success()
        .stderr(contains("=== begin build-id ==="))
        .stderr(contains("--- begin salt ---\nmy-salt\n--- end salt ---\n"))
        .stderr(contains("CFLAGS=-O2\n"))
        .stderr(contains("=== end build-id ===\n"));

    assert_eq!(quiet_out.stdout, noisy.get_output().stdout);
}

#[test]
fn empty_debug_value_does_not_echo() {
    let tmp = tempdir().expect("tempdir");
    let assert = build_id_cmd(tmp.path())
        .env("DEBUG", "")
        .assert()
        .success();
    assert!(assert.get_output().stderr.is_empty());
}

#[test]
fn verbose_reports_failing_probes_without_changing_the_id() {
    let tmp = tempdir().expect("tempdir");

    let quiet = build_id_cmd(tmp.path())
        .env("CC", "/definitely/not/a/real/cc")
        .assert()
        .success();
    let verbose = build_id_cmd(tmp.path())
        .env("CC", "/definitely/not/a/real/cc")
        .arg("--verbose")
        .assert()
        .success()
        .stderr(contains("BUILD_ID_WARN code=W002 stage=probe"))
        .stderr(contains("probe=/definitely/not/a/real/cc_--version"));

    assert_eq!(quiet.get_output().stdout, verbose.get_output().stdout);
}
