//! Drives the `pipesh` binary the way a user or a script would.

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn pipesh() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pipesh"));
    cmd.env("PATH", "/usr/local/bin:/usr/bin:/bin");
    cmd
}

fn run_command(line: &str) -> Output {
    pipesh()
        .args(["-c", line])
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn run_session(home: &std::path::Path, input: &str) -> Output {
    let mut child = pipesh()
        .env("HOME", home)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn command_mode_runs_pipeline() {
    let out = run_command("printf 'b\\na\\nc\\n' | sort | head -n 2");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "a\nb\n");
}

#[test]
fn command_mode_reports_exit_status() {
    assert_eq!(run_command("exit 3").status.code(), Some(3));
    assert_eq!(run_command("false").status.code(), Some(1));
    assert_eq!(run_command("no-such-command-xyz").status.code(), Some(255));

    let out = run_command("exit abc");
    assert_eq!(out.status.code(), Some(255));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Invalid exit code"));
}

#[test]
fn command_not_found_is_reported() {
    let out = run_command("no-such-command-xyz");
    assert!(String::from_utf8_lossy(&out.stderr).contains("no-such-command-xyz: command not found"));
}

#[test]
fn syntax_error_does_not_spawn() {
    let out = run_command("echo 'unterminated");
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unmatched"));
}

#[test]
fn session_keeps_state_and_history() {
    let home = tempfile::tempdir().unwrap();
    let out_file = home.path().join("out");
    let script = format!(
        "export GREETING=hi\nprintenv GREETING > {out}\n!!\nhistory\nexit 5\n",
        out = out_file.display()
    );

    let out = run_session(home.path(), &script);
    assert_eq!(out.status.code(), Some(5));
    assert_eq!(fs::read_to_string(&out_file).unwrap(), "hi\n");

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(&format!("printenv GREETING > {}", out_file.display())));
    assert!(stdout.contains("4  history"));

    let stored = fs::read_to_string(home.path().join(".shell_history")).unwrap();
    assert_eq!(stored.lines().count(), 5);
    assert_eq!(stored.lines().last(), Some("exit 5"));
}

#[test]
fn session_ends_on_eof() {
    let home = tempfile::tempdir().unwrap();
    let out = run_session(home.path(), "true\n");
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("exit"));
}
