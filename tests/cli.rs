use assert_cmd::Command;
use predicates::prelude::*;

fn eco() -> Command {
    let mut cmd = Command::cargo_bin("eco-untung").unwrap();
    // Keep the developer's real key out of these runs.
    cmd.env_remove("GEMINI_API_KEY");
    cmd
}

#[test]
fn test_cli_help() {
    eco()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: eco-untung"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("rewards"))
        .stdout(predicate::str::contains("--api-key"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_cli_serve_help() {
    eco()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: eco-untung serve"))
        .stdout(predicate::str::contains("--port <PORT>"))
        .stdout(predicate::str::contains("--templates <TEMPLATES>"))
        .stdout(predicate::str::contains("--static-dir <STATIC_DIR>"));
}

#[test]
fn test_cli_scan_help() {
    eco()
        .arg("scan")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: eco-untung scan [OPTIONS] <IMAGE>"));
}

#[test]
fn test_cli_no_command() {
    // clap exits with non-zero status when no command is given
    eco()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: eco-untung"));
}

#[test]
fn test_rewards_lists_catalog() {
    eco()
        .arg("rewards")
        .assert()
        .success()
        .stdout(predicate::str::contains("Es Teh Manis Jumbo"))
        .stdout(predicate::str::contains("Warung Bu Siti"))
        .stdout(predicate::str::contains("250 Poin"));
}

#[test]
fn test_scan_missing_file_fails() {
    eco()
        .arg("scan")
        .arg("/definitely/not/here.jpg")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read image"));
}

#[test]
fn test_scan_without_api_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("trash.jpg");
    std::fs::write(&image, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

    eco()
        .current_dir(dir.path())
        .arg("scan")
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}
