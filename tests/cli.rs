//! Binary-level checks of argument handling and exit codes.

use predicates::prelude::*;
use std::time::Duration;

#[test]
fn help_lists_commands() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("multiflash");
    cmd.arg("--help").timeout(Duration::from_secs(5));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("flash"))
        .stdout(predicate::str::contains("images"));
}

#[test]
fn rejects_out_of_range_channel() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::cargo_bin_cmd!("multiflash");
    cmd.current_dir(dir.path())
        .env_remove("MULTIFLASH_CONFIG")
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["flash", "--channel", "9"])
        .timeout(Duration::from_secs(5));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid channel: 9"));
}

#[test]
fn missing_scanner_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::cargo_bin_cmd!("multiflash");
    cmd.current_dir(dir.path())
        .env_remove("MULTIFLASH_CONFIG")
        .env("XDG_CONFIG_HOME", dir.path())
        .env("RUST_LOG", "off")
        .args(["--scanner-tool", "/nonexistent/xdsdfu", "scan"])
        .timeout(Duration::from_secs(5));
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("device scanner not found"))
        .stderr(predicate::str::contains("--scanner-tool"));
}

#[test]
fn images_lists_out_files() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("image");
    std::fs::create_dir_all(&images).unwrap();
    std::fs::write(images.join("blinky.out"), b"\x7fELF").unwrap();
    std::fs::write(images.join("notes.txt"), "x").unwrap();

    let mut cmd = assert_cmd::cargo_bin_cmd!("multiflash");
    cmd.current_dir(dir.path())
        .env_remove("MULTIFLASH_CONFIG")
        .env("XDG_CONFIG_HOME", dir.path())
        .env("RUST_LOG", "off")
        .args(["images", "--json"])
        .timeout(Duration::from_secs(5));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("blinky.out"))
        .stdout(predicate::str::contains("notes.txt").not());
}
