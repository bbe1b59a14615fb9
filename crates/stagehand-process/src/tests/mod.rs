//! Runner tests against real child processes.

use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::{CommandRunner, CommandSpec, ProcessError, SystemRunner};

/// Upper bound for commands that would hang if capture deadlocked.
const HANG_GUARD: Duration = Duration::from_secs(60);

#[fixture]
fn runner() -> SystemRunner {
    SystemRunner::new()
}

fn shell(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

#[rstest]
fn captures_each_stream_in_order(runner: SystemRunner) {
    let output = runner
        .run(&shell("echo one; echo two >&2; echo three; printf tail"))
        .expect("command succeeds");
    assert!(output.success());
    assert_eq!(output.stdout(), ["one", "three", "tail"]);
    assert_eq!(output.stderr(), ["two"]);
    assert_eq!(output.stdout_text(), "one\nthree\ntail\n");
}

#[rstest]
fn non_zero_exit_reports_status_and_stderr(runner: SystemRunner) {
    let err = runner
        .run(&shell("echo boom >&2; exit 2"))
        .expect_err("command fails");
    let failure = err.failure().expect("non-zero exit report");
    assert_eq!(failure.status(), Some(2));
    let message = err.to_string();
    assert!(message.contains("boom"), "message lacks stderr: {message}");
    assert!(message.contains("status 2"), "message lacks status: {message}");
}

#[rstest]
fn failure_report_lists_env_then_stdout_then_stderr(runner: SystemRunner) {
    let spec = shell("echo first; echo second >&2; exit 1").env("PGHOST", "localhost");
    let message = runner.run(&spec).expect_err("command fails").to_string();

    let env_at = message.find("\n  PGHOST=localhost").expect("env listed");
    let stdout_at = message.find("\n  first").expect("stdout listed");
    let stderr_at = message.find("\n  second").expect("stderr listed");
    assert!(env_at < stdout_at && stdout_at < stderr_at, "{message}");
    assert!(message.starts_with("`sh -c"), "{message}");
}

#[rstest]
fn supplied_env_overrides_inherited_values(runner: SystemRunner) {
    let spec = shell("echo \"$HOME:$STAGEHAND_PROBE\"")
        .env("HOME", "/nowhere")
        .env("STAGEHAND_PROBE", "present");
    let output = runner.run(&spec).expect("command succeeds");
    assert_eq!(output.stdout(), ["/nowhere:present"]);
}

#[rstest]
fn runs_in_the_requested_directory(runner: SystemRunner) {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("package-lock.json"), "{}").expect("write marker");
    let output = runner
        .run(&CommandSpec::new("ls").current_dir(dir.path()))
        .expect("command succeeds");
    assert_eq!(output.stdout(), ["package-lock.json"]);
}

#[rstest]
fn missing_program_is_reported_as_not_found(runner: SystemRunner) {
    let err = runner
        .run(&CommandSpec::new("stagehand-definitely-not-installed"))
        .expect_err("spawn fails");
    assert!(err.is_program_not_found(), "unexpected error: {err:?}");
    assert!(matches!(err, ProcessError::ProgramNotFound { .. }));
}

fn run_with_hang_guard(spec: CommandSpec) -> Result<crate::ProcessOutput, ProcessError> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = SystemRunner::new().run(&spec);
        drop(tx.send(result));
    });
    rx.recv_timeout(HANG_GUARD)
        .expect("command finished without deadlocking")
}

#[test]
fn megabyte_of_stdout_does_not_deadlock() {
    let spec = shell("head -c 1048576 /dev/zero | tr '\\0' 'a'; echo; echo done >&2");
    let output = run_with_hang_guard(spec).expect("command succeeds");
    let first = output.stdout().first().expect("stdout captured");
    assert_eq!(first.len(), 1_048_576);
    assert_eq!(output.stderr(), ["done"]);
}

#[test]
fn interleaved_heavy_streams_are_drained_independently() {
    let spec = shell(
        "i=0; while [ $i -lt 20000 ]; do echo \"out $i\"; echo \"err $i\" >&2; i=$((i+1)); done",
    );
    let output = run_with_hang_guard(spec).expect("command succeeds");
    assert_eq!(output.stdout().len(), 20_000);
    assert_eq!(output.stderr().len(), 20_000);
    assert_eq!(output.stdout().last().map(String::as_str), Some("out 19999"));
    assert_eq!(output.stderr().first().map(String::as_str), Some("err 0"));
}
