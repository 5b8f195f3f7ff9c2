use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// The shell boots with `PATH=bin:.`; tests re-point it through the builtin
/// before running anything external.
const SANE_PATH: &str = "setenv PATH /usr/bin:/bin";

fn run_script_in(dir: Option<&Path>, lines: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_npshell"));
    // Keep test runs out of the real ~/.npshell_history.
    cmd.env_remove("HOME");
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn npshell");
    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write script line");
        }
    }
    drop(child.stdin.take());
    child.wait_with_output().expect("collect output")
}

fn run_script(lines: &[&str]) -> (String, String) {
    let output = run_script_in(None, lines);
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

fn temp_workdir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("npshell_e2e_{}_{tag}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create temp workdir");
    dir
}

#[test]
fn plain_pipeline_delivers_bytes() {
    let (stdout, stderr) = run_script(&[SANE_PATH, "echo hello | cat", "exit"]);
    assert!(stdout.contains("hello\n"), "stdout: {stdout:?}");
    assert!(!stderr.contains("Unknown command"), "stderr: {stderr:?}");
}

#[test]
fn numbered_pipe_input_is_ignored_by_a_non_reader() {
    let (stdout, _) = run_script(&[SANE_PATH, "echo one |1", "echo two", "exit"]);
    assert!(stdout.contains("two\n"), "stdout: {stdout:?}");
    assert!(!stdout.contains("one"), "stdout: {stdout:?}");
}

#[test]
fn numbered_pipe_feeds_the_next_prompt() {
    let (stdout, _) = run_script(&[SANE_PATH, "echo alpha |1", "cat", "exit"]);
    assert!(stdout.contains("alpha\n"), "stdout: {stdout:?}");
}

#[test]
fn empty_lines_do_not_consume_a_target_slot() {
    // `|2` fires two non-empty prompts later; the blank line in between is
    // not counted.
    let (stdout, _) = run_script(&[
        SANE_PATH,
        "echo bridge |2",
        "",
        "echo mid",
        "cat",
        "exit",
    ]);
    assert!(stdout.contains("mid\n"), "stdout: {stdout:?}");
    assert!(stdout.contains("bridge\n"), "stdout: {stdout:?}");
}

#[test]
fn two_producers_targeting_one_prompt_are_merged() {
    let (stdout, _) = run_script(&[SANE_PATH, "echo aa |2", "echo bb |1", "cat", "exit"]);
    assert!(stdout.contains("aa"), "stdout: {stdout:?}");
    assert!(stdout.contains("bb"), "stdout: {stdout:?}");
}

#[test]
fn bang_pipe_carries_stderr() {
    let missing = "definitely_not_a_file_xyz";
    let (stdout, _) = run_script(&[
        SANE_PATH,
        "ls definitely_not_a_file_xyz !1",
        "cat",
        "exit",
    ]);
    assert!(stdout.contains(missing), "stdout: {stdout:?}");
}

#[test]
fn redirection_writes_the_file_not_the_terminal() {
    let dir = temp_workdir("redirect");
    let output = run_script_in(Some(&dir), &[SANE_PATH, "echo hi > out.txt", "exit"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        fs::read_to_string(dir.join("out.txt")).expect("read out.txt"),
        "hi\n"
    );
    assert!(!stdout.contains("hi"), "stdout: {stdout:?}");
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn redirection_beats_a_following_pipe() {
    let dir = temp_workdir("redirect_pipe");
    let output = run_script_in(
        Some(&dir),
        &[SANE_PATH, "echo secret > kept.txt | cat", "exit"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        fs::read_to_string(dir.join("kept.txt")).expect("read kept.txt"),
        "secret\n"
    );
    assert!(!stdout.contains("secret"), "stdout: {stdout:?}");
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn bang_pipe_with_redirect_splits_the_streams() {
    // The redirect only rebinds stdout, after stderr has already been merged
    // onto the numbered pipe: the ls error must reach the target prompt and
    // the file must stay empty (ls prints nothing to stdout for a missing
    // operand). The classical source sent both to the file.
    let dir = temp_workdir("bang_redirect");
    let output = run_script_in(
        Some(&dir),
        &[SANE_PATH, "ls missing_xyz > listing.txt !1", "cat", "exit"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("missing_xyz"), "stdout: {stdout:?}");
    let listing = fs::read_to_string(dir.join("listing.txt")).expect("read listing.txt");
    assert!(listing.is_empty(), "listing.txt: {listing:?}");
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn redirection_beats_a_numbered_pipe_on_the_same_segment() {
    // `> file` wins stdout against `|N` too: the bytes land in the file and
    // the target prompt's consumer reads immediate EOF.
    let dir = temp_workdir("numbered_redirect");
    let output = run_script_in(
        Some(&dir),
        &[
            SANE_PATH,
            "echo secret > kept.txt |1",
            "cat",
            "echo done",
            "exit",
        ],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        fs::read_to_string(dir.join("kept.txt")).expect("read kept.txt"),
        "secret\n"
    );
    assert!(!stdout.contains("secret"), "stdout: {stdout:?}");
    assert!(stdout.contains("done\n"), "stdout: {stdout:?}");
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn tail_after_a_numbered_pipe_runs_as_the_next_prompt() {
    let (stdout, _) = run_script(&[SANE_PATH, "echo tailpay |1 cat", "exit"]);
    assert!(stdout.contains("tailpay\n"), "stdout: {stdout:?}");
}

#[test]
fn setenv_printenv_round_trip() {
    let (stdout, _) = run_script(&["setenv GREETING hola", "printenv GREETING", "exit"]);
    assert!(stdout.contains("hola\n"), "stdout: {stdout:?}");
}

#[test]
fn printenv_of_an_unset_variable_prints_nothing() {
    let (stdout, _) = run_script(&["printenv NPSHELL_NOT_SET_XYZ", "exit"]);
    // Nothing but prompt characters on stdout.
    assert!(
        stdout.chars().all(|c| c == '%' || c == ' '),
        "stdout: {stdout:?}"
    );
}

#[test]
fn setenv_without_enough_arguments_is_an_error() {
    let (_, stderr) = run_script(&["setenv ONLY_KEY", "exit"]);
    assert!(
        stderr.contains("setenv: not enough arguments"),
        "stderr: {stderr:?}"
    );
}

#[test]
fn unknown_commands_are_reported_and_the_shell_survives() {
    let (stdout, stderr) = run_script(&[
        SANE_PATH,
        "definitely_not_here_xyz",
        "echo still alive",
        "exit",
    ]);
    assert!(
        stderr.contains("Unknown command: [definitely_not_here_xyz]."),
        "stderr: {stderr:?}"
    );
    assert!(stdout.contains("still alive\n"), "stdout: {stdout:?}");
}

#[test]
fn builtin_prompts_consume_their_registry_slot() {
    // `|1` targets the printenv prompt; a builtin never reads stdin, and its
    // slot's descriptors are closed, so "lost" must never surface later.
    let (stdout, _) = run_script(&[
        SANE_PATH,
        "echo lost |1",
        "printenv PATH",
        "echo after",
        "exit",
    ]);
    assert!(stdout.contains("/usr/bin:/bin"), "stdout: {stdout:?}");
    assert!(stdout.contains("after\n"), "stdout: {stdout:?}");
    assert!(!stdout.contains("lost"), "stdout: {stdout:?}");
}

#[test]
fn exit_and_eof_both_terminate_cleanly() {
    let by_exit = run_script_in(None, &["exit"]);
    assert!(by_exit.status.success());

    let by_eof = run_script_in(None, &[]);
    assert!(by_eof.status.success());
}

#[test]
fn numbered_pipe_with_no_tail_still_returns_a_prompt() {
    // The producer is not awaited; the shell must come back for more input
    // and the pending bytes must survive until their target prompt.
    let (stdout, _) = run_script(&[SANE_PATH, "echo later |2", "echo now", "cat", "exit"]);
    assert!(stdout.contains("now\n"), "stdout: {stdout:?}");
    assert!(stdout.contains("later\n"), "stdout: {stdout:?}");
}
