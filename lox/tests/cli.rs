use std::{
    fs,
    io::Write,
    path::Path,
    process::{Command, Output, Stdio},
};

use tempfile::TempDir;

fn run_script(dir: &TempDir, source: &str) -> Output {
    let path = dir.path().join("script.lox");
    fs::write(&path, source).unwrap();
    lox(dir.path(), &path)
}

fn lox(cwd: &Path, script: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lox"))
        .arg(script)
        .current_dir(cwd)
        .env_remove("LOX_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).unwrap()
}

#[test]
fn test_success() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(&dir, "print 1 + 2 * 3;\nprint \"done\";\n");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "7\ndone\n");
    assert_eq!(stderr(&output), "");
}

#[test]
fn test_compile_error_exits_65() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(&dir, "print \"never\";\nprint 1 +;\n");
    assert_eq!(output.status.code(), Some(65));
    assert_eq!(stdout(&output), "");
    assert_eq!(
        stderr(&output),
        "[line 2] Error at ';': Expect expression.\n"
    );
}

#[test]
fn test_runtime_error_exits_70() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(&dir, "print \"before\";\nprint -\"x\";\n");
    assert_eq!(output.status.code(), Some(70));
    assert_eq!(stdout(&output), "before\n");
    assert_eq!(
        stderr(&output),
        "Operand must be a number.\n[line 2] in script\n"
    );
}

#[test]
fn test_missing_file_exits_74() {
    let dir = tempfile::tempdir().unwrap();
    let output = lox(dir.path(), &dir.path().join("missing.lox"));
    assert_eq!(output.status.code(), Some(74));
    assert!(stderr(&output).starts_with("Could not read file"));
}

#[test]
fn test_print_code_from_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lox.toml"), "[vm]\nprint_code = true\n").unwrap();
    let output = run_script(&dir, "print 1;\n");
    assert_eq!(output.status.code(), Some(0));
    let out = stdout(&output);
    assert!(out.starts_with("== <script> ==\n"), "{out}");
    assert!(out.contains("OP_PRINT"));
    assert!(out.ends_with("1\n"));
}

#[test]
fn test_malformed_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lox.toml"), "[vm\nprint_code = ").unwrap();
    let output = run_script(&dir, "print 2;\n");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "2\n");
    assert!(stderr(&output).contains("error loading config file"));
}

#[test]
fn test_two_args_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.lox");
    fs::write(&path, "print 1;\n").unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_lox"))
        .arg(&path)
        .arg(&path)
        .current_dir(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stdout(&output), "");
    assert!(stderr(&output).contains("Usage: lox [FILE]"));
}

#[test]
fn test_repl_keeps_globals_and_skips_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let history = dir.path().join("history");
    fs::write(
        dir.path().join("lox.toml"),
        format!("[repl]\nhistory_file = {:?}\n", history.display().to_string()),
    )
    .unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_lox"))
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("LOX_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"var a = 1;\n\nprint a;\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("1\n"), "{}", stdout(&output));
    assert!(!stderr(&output).contains("Undefined variable"));
}
