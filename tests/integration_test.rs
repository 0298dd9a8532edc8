use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Runs crust with `home` as HOME and `cwd` as working directory, feeding
/// `input` on stdin.
fn run_crust(args: &[&str], input: &str, home: &Path, cwd: &Path) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_crust"));
    cmd.args(args)
        .current_dir(cwd)
        .env("HOME", home)
        .env_remove("COHERE_API_KEY")
        .env_remove("CO_API_KEY")
        // Deterministic offline chat replies
        .env("CRUST_USE_MOCK", "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }
    Ok(child.wait_with_output()?)
}

#[test]
fn test_config_without_file() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_crust(&["--config"], "", home.path(), home.path())?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Status: Not found"));
    assert!(stdout.contains(".crust/config.toml"));
    Ok(())
}

#[test]
fn test_set_api_key_persists_config() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_crust(&["--set-api-key", "test-key-123"], "", home.path(), home.path())?;
    assert!(output.status.success());

    let saved = fs::read_to_string(home.path().join(".crust/config.toml"))?;
    assert!(saved.contains("test-key-123"));

    let output = run_crust(&["--config"], "", home.path(), home.path())?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Status: Found"));
    assert!(stdout.contains("API Key: Set"));
    Ok(())
}

#[test]
fn test_end_of_input_exits_cleanly_and_saves_history() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_crust(&[], "echo hello-from-crust\n", home.path(), home.path())?;

    assert!(output.status.success(), "Shell should exit with status 0 at end of input");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello-from-crust"));
    assert!(stdout.contains("Goodbye!"));

    let history = fs::read_to_string(home.path().join(".crust_history"))?;
    assert_eq!(history, "echo hello-from-crust\n");
    Ok(())
}

#[test]
fn test_history_is_appended_across_sessions() -> Result<()> {
    let home = TempDir::new()?;

    run_crust(&[], "echo one\n", home.path(), home.path())?;
    run_crust(&[], "echo two\n", home.path(), home.path())?;

    let history = fs::read_to_string(home.path().join(".crust_history"))?;
    assert_eq!(history, "echo one\necho two\n");
    Ok(())
}

#[test]
fn test_builtin_listing_and_cd() -> Result<()> {
    let home = TempDir::new()?;
    fs::create_dir_all(home.path().join("work/nested/target-dir"))?;
    fs::write(home.path().join("work/nested/target-dir/inside.txt"), "x")?;

    let output = run_crust(&[], "cd target-dir\nls\n", home.path(), &home.path().join("work"))?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Found directory"));
    assert!(stdout.contains("Directory Listing"));
    assert!(stdout.contains("inside.txt"));
    assert!(stdout.contains("1 bytes"));
    Ok(())
}

#[test]
fn test_nonzero_exit_does_not_stop_the_shell() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_crust(&[], "exit 4\necho still-running\n", home.path(), home.path())?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Command exited with status 4"));
    assert!(stdout.contains("still-running"));
    Ok(())
}

#[test]
fn test_question_in_mock_mode() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_crust(&[], ".question hello there\n", home.path(), home.path())?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Mock reply to: hello there"));
    Ok(())
}

#[test]
fn test_question_runs_approved_command() -> Result<()> {
    let home = TempDir::new()?;
    fs::write(home.path().join("marker-file.txt"), "")?;

    let output = run_crust(&[], ".question list my files\nyes\n", home.path(), home.path())?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK if I execute this command?"));
    assert!(stdout.contains("marker-file.txt"));
    assert!(stdout.contains("Thanks, that is what I needed."));
    Ok(())
}

#[test]
fn test_question_declined_command_is_skipped() -> Result<()> {
    let home = TempDir::new()?;
    fs::write(home.path().join("marker-file.txt"), "")?;

    let output = run_crust(&[], ".question list my files\nno\n", home.path(), home.path())?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Skipped: ls"));
    assert!(!stdout.contains("marker-file.txt"));
    Ok(())
}

#[test]
fn test_capk_rejects_invalid_name_without_network() -> Result<()> {
    let home = TempDir::new()?;

    let output = run_crust(&["capk", "Bad;Name"], "", home.path(), home.path())?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid package name"));
    Ok(())
}
