// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end tests for the Lockstep shim.
//!
//! These tests launch the host program with `liblockstep_shim.so` preloaded.
//! The shim is a separate cdylib; when it has not been built into the same
//! target directory the tests report that and pass without running.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

mod platform;

use crate::platform::{CommandExt, artifact_dir};

fn host_program() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_host-program"));
    command.without_lockstep_env().stdout(Stdio::piped()).stderr(Stdio::piped());
    command
}

fn shim_library() -> Option<PathBuf> {
    let path = artifact_dir().join("liblockstep_shim.so");
    if path.is_file() {
        Some(path)
    } else {
        eprintln!("skipping: {} not built", path.display());
        None
    }
}

fn run(command: &mut Command) -> (Output, String, String) {
    let output = command.output().expect("Failed to run host program");
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    assert!(
        output.status.success(),
        "host program failed: {:?}\nStdout: {}\nStderr: {}",
        output.status,
        stdout,
        stderr
    );
    (output, stdout, stderr)
}

fn entry_points(summary: &str) -> Vec<i64> {
    summary
        .lines()
        .filter_map(|line| line.strip_prefix("Record for entry point : "))
        .filter_map(|rest| rest.split_whitespace().next())
        .filter_map(|key| key.parse().ok())
        .collect()
}

/// Entry points with the number of distinct threads recorded for each.
fn entry_point_threads(summary: &str) -> Vec<(i64, usize)> {
    let mut records: Vec<(i64, usize)> = Vec::new();
    for line in summary.lines() {
        if let Some(rest) = line.strip_prefix("Record for entry point : ") {
            if let Some(key) = rest.split_whitespace().next().and_then(|key| key.parse().ok()) {
                records.push((key, 0));
            }
        } else if line.starts_with("  - ") {
            if let Some((_, threads)) = records.last_mut() {
                *threads += 1;
            }
        }
    }
    records
}

fn reported_pid(stdout: &str) -> &str {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("host: pid "))
        .expect("host reports its pid")
}

#[test]
fn host_program_runs_without_shim() {
    let (_, stdout, _) = run(host_program().args(["threads", "2"]));
    assert!(stdout.contains("host: joined 2 threads"));
    assert!(stdout.contains("host: completed"));
    assert!(!stdout.contains("Record for entry point"));
}

#[test]
fn threads_are_tracked_once_main_is_designated() {
    let Some(shim) = shim_library() else { return };

    let (_, stdout, stderr) = run(host_program()
        .args(["threads", "3"])
        .with_shim_libraries(&[shim])
        .env("LOCKSTEP_INIT_TRIGGER", "load")
        .env("LOCKSTEP_LOG__LEVEL", "info"));

    assert!(stdout.contains("host: joined 3 threads"), "{stdout}");
    let keys = entry_points(&stdout);
    assert_eq!(keys.len(), 1, "all workers share one launch site:\n{stdout}");
    assert_eq!(stdout.matches("1: Started and lasted").count(), 3, "{stdout}");

    assert!(stderr.contains("lockstep runtime loaded"), "{stderr}");
    assert!(stderr.contains("thread summary"), "{stderr}");
}

#[test]
fn exit_summary_is_written_at_the_default_log_level() {
    let Some(shim) = shim_library() else { return };

    let (_, _, stderr) = run(host_program()
        .args(["threads", "2"])
        .with_shim_libraries(&[shim.clone()])
        .env("LOCKSTEP_INIT_TRIGGER", "load"));
    let exit_summary = stderr.split("thread summary:").nth(1).expect("exit summary");
    assert_eq!(entry_points(exit_summary).len(), 1, "{stderr}");
    assert!(!stderr.contains("panicked"), "{stderr}");

    let (_, _, quiet) = run(host_program()
        .args(["threads", "2"])
        .with_shim_libraries(&[shim])
        .env("LOCKSTEP_INIT_TRIGGER", "load")
        .env("LOCKSTEP_SUMMARY_ON_EXIT", "false"));
    assert!(!quiet.contains("thread summary"), "{quiet}");
}

#[test]
fn summary_to_a_closed_descriptor_reports_failure() {
    let Some(shim) = shim_library() else { return };

    let (_, stdout, _) = run(host_program()
        .args(["threads", "1"])
        .with_shim_libraries(&[shim]));
    assert!(
        stdout.contains("host: summary to a closed descriptor returned -1"),
        "{stdout}"
    );
}

#[test]
fn threads_before_init_cannot_be_waited_for() {
    let Some(shim) = shim_library() else { return };

    // No SDL in the host, so the default trigger never fires.
    let (_, stdout, _) = run(host_program()
        .args(["threads", "2"])
        .with_shim_libraries(&[shim]));

    assert!(entry_points(&stdout).is_empty(), "{stdout}");
    let pre_init = stdout
        .split("These threads started before init and can't be waited for :")
        .nth(1)
        .expect("pre-init section");
    assert!(pre_init.contains("0x"), "{stdout}");
}

#[test]
fn interest_key_is_stable_across_runs_and_pauses_main() {
    let Some(shim) = shim_library() else { return };

    let (_, discovery, _) = run(host_program()
        .arg("pause-probe")
        .with_shim_libraries(&[shim.clone()])
        .env("LOCKSTEP_INIT_TRIGGER", "load"));
    assert!(discovery.contains("host: main frozen=false"), "{discovery}");
    let keys = entry_points(&discovery);
    assert_eq!(keys.len(), 1, "{discovery}");
    let key = keys[0];

    let (_, paused, _) = run(host_program()
        .arg("pause-probe")
        .with_shim_libraries(&[shim])
        .env("LOCKSTEP_INIT_TRIGGER", "load")
        .env("LOCKSTEP_INTEREST_KEYS", key.to_string()));

    assert!(paused.contains("host: main frozen=true"), "{paused}");
    assert!(
        paused.contains(&format!("Record for entry point : {key} (waited for)")),
        "{paused}"
    );
}

#[test]
fn main_stays_paused_until_the_last_overlapping_holder_ends() {
    let Some(shim) = shim_library() else { return };

    let (_, discovery, _) = run(host_program()
        .arg("overlap-probe")
        .with_shim_libraries(&[shim.clone()])
        .env("LOCKSTEP_INIT_TRIGGER", "load"));
    assert!(
        discovery.contains("host: main frozen after first holder=false"),
        "{discovery}"
    );
    // The two holders share a launch site; the helper thread has its own.
    let (key, _) = entry_point_threads(&discovery)
        .into_iter()
        .find(|(_, threads)| *threads == 2)
        .unwrap_or_else(|| panic!("no entry point with two threads:\n{discovery}"));

    let (_, held, _) = run(host_program()
        .arg("overlap-probe")
        .with_shim_libraries(&[shim])
        .env("LOCKSTEP_INIT_TRIGGER", "load")
        .env("LOCKSTEP_INTEREST_KEYS", key.to_string()));
    assert!(
        held.contains("host: main frozen after first holder=true"),
        "{held}"
    );
    assert!(
        held.contains(&format!("Record for entry point : {key} (waited for)")),
        "{held}"
    );
}

#[test]
fn identity_reused_after_init_reports_a_running_thread() {
    let Some(shim) = shim_library() else { return };

    // Default trigger: nothing is designated until the host asks for it.
    let (_, stdout, _) = run(host_program()
        .arg("reuse")
        .with_shim_libraries(&[shim]));

    let running = stdout
        .split("host: summary while running")
        .nth(1)
        .and_then(|rest| rest.split("host: end of running summary").next())
        .expect("summary taken while the thread runs");
    assert_eq!(entry_points(running).len(), 1, "{stdout}");
    assert!(running.contains("1: Started and is still running."), "{stdout}");
    assert!(!running.contains("lasted"), "{stdout}");
    assert!(running.contains("can't be waited for :\n0x"), "{stdout}");
}

#[test]
fn pid_override_applies_to_matching_callers() {
    let Some(shim) = shim_library() else { return };

    let mut config = tempfile::Builder::new().suffix(".toml").tempfile().expect("config file");
    writeln!(config, "[[pid-overrides]]\nlibrary = \"host-program\"\npid = 1234")
        .expect("write config");

    let (_, overridden, _) = run(host_program()
        .arg("pid")
        .with_shim_libraries(&[shim.clone()])
        .env("LOCKSTEP_CONFIG", config.path()));
    assert_eq!(reported_pid(&overridden), "1234", "{overridden}");

    let (_, disabled, _) = run(host_program()
        .arg("pid")
        .with_shim_libraries(&[shim])
        .env("LOCKSTEP_CONFIG", config.path())
        .env("LOCKSTEP_ENABLED", "0"));
    assert_ne!(reported_pid(&disabled), "1234", "{disabled}");
    // disabled runtime exports no summary
    assert!(!disabled.contains("Record for entry point"));
}

#[test]
fn broken_configuration_falls_back_to_defaults() {
    let Some(shim) = shim_library() else { return };

    let (_, stdout, stderr) = run(host_program()
        .args(["threads", "1"])
        .with_shim_libraries(&[shim])
        .env("LOCKSTEP_PAUSE_SIGNAL", "SIGBOGUS"));

    assert!(stdout.contains("host: completed"), "{stdout}");
    assert!(stderr.contains("invalid configuration, using defaults"), "{stderr}");
}
