//! CLI integration tests

use std::process::{Command, Output};

fn kube_capacity(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kube-capacity"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = kube_capacity(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("requests, limits and utilization"),
        "Should describe the tool"
    );
    assert!(stdout.contains("config"), "Should show config command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = kube_capacity(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("kube-capacity"), "Should show binary name");
}

/// Test that every report flag is documented
#[test]
fn test_report_flags() {
    let output = kube_capacity(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    for flag in [
        "--pods",
        "--util",
        "--namespace",
        "--pod-labels",
        "--node-labels",
        "--sort",
        "--kubeconfig",
        "--context",
        "--verbose",
        "--log-format",
    ] {
        assert!(stdout.contains(flag), "Should show {flag} option");
    }
}

/// Test output option
#[test]
fn test_output_option() {
    let output = kube_capacity(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--output"), "Should show output option");
    for format in ["table", "json", "tsv", "csv"] {
        assert!(stdout.contains(format), "Should show {format} format");
    }
}

/// Test config subcommand help
#[test]
fn test_config_help() {
    let output = kube_capacity(&["config", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Config help should succeed");
    assert!(stdout.contains("show"), "Should show show command");
    assert!(stdout.contains("path"), "Should show path command");
    assert!(stdout.contains("init"), "Should show init command");
}

/// Test config init help
#[test]
fn test_config_init_help() {
    let output = kube_capacity(&["config", "init", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Config init help should succeed");
    assert!(stdout.contains("--force"), "Should show force option");
}

/// Test invalid output format error handling
#[test]
fn test_invalid_output_format() {
    let output = kube_capacity(&["--output", "yaml"]);

    assert!(!output.status.success(), "Invalid format should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid value") || stderr.contains("error"),
        "Should show error message"
    );
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = kube_capacity(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("unrecognized"),
        "Should show error message"
    );
}

/// Test that an unreadable kubeconfig exits with the connection status
#[test]
fn test_missing_kubeconfig_exit_code() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing-kubeconfig");
    let output = Command::new(env!("CARGO_BIN_EXE_kube-capacity"))
        .args(["--kubeconfig", missing.to_str().unwrap()])
        .env("HOME", dir.path())
        .env_remove("KUBE_CAPACITY_DEFAULT_OUTPUT")
        .env_remove("KUBE_CAPACITY_DEFAULT_SORT")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1), "Connect failures exit with 1");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error connecting to Kubernetes"),
        "Should explain the connection failure"
    );
}
