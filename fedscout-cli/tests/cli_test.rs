use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use tempfile::{tempdir, TempDir};

fn create_test_files(dir: &TempDir, files: &[&str]) -> Result<()> {
    for name in files {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(file_path)?;
        writeln!(file, "{}", name)?;
    }
    Ok(())
}

fn cli() -> Result<Command> {
    let mut cmd = Command::cargo_bin("fedscout-cli")?;
    // Keep stray user config and RUST_LOG out of the tests
    cmd.env_remove("RUST_LOG").env("NO_COLOR", "1");
    Ok(cmd)
}

#[test]
fn test_search_single_directory() -> Result<()> {
    let temp_dir = tempdir()?;
    create_test_files(
        &temp_dir,
        &["ubuntu-24.04-desktop.iso", "debian-12.iso", "notes.txt"],
    )?;

    cli()?
        .args(["search", "ubuntu", "-d", temp_dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ubuntu-24.04-desktop.iso"))
        .stdout(predicate::str::contains("debian-12.iso").not())
        .stdout(predicate::str::contains("Found 1 results from 1 sources"));
    Ok(())
}

#[test]
fn test_search_multiple_directories_with_filter() -> Result<()> {
    let first = tempdir()?;
    let second = tempdir()?;
    create_test_files(&first, &["ubuntu-desktop.iso", "ubuntu-beta.iso"])?;
    create_test_files(&second, &["ubuntu-server.iso"])?;

    cli()?
        .args([
            "search",
            "ubuntu -:keyword:beta",
            "-d",
            first.path().to_str().unwrap(),
            "-d",
            second.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("ubuntu-beta.iso").not())
        .stdout(predicate::str::contains("Found 2 results from 2 sources"));
    Ok(())
}

#[test]
fn test_search_crawl_dirs_json() -> Result<()> {
    let temp_dir = tempdir()?;
    create_test_files(&temp_dir, &["album/track-01.mp3", "album/track-02.mp3"])?;

    let output = cli()?
        .args([
            "search",
            "track",
            "--crawl-dirs",
            "--json",
            "-d",
            temp_dir.path().to_str().unwrap(),
        ])
        .output()?;
    assert!(output.status.success());

    let results: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let results = results.as_array().expect("json array");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r["parent"] == "album"));
    Ok(())
}

#[test]
fn test_search_limit() -> Result<()> {
    let temp_dir = tempdir()?;
    create_test_files(&temp_dir, &["iso-a.iso", "iso-b.iso", "iso-c.iso"])?;

    cli()?
        .args(["search", "iso", "-n", "1", "-d", temp_dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 3 results from 1 sources"));
    Ok(())
}

#[test]
fn test_malformed_filter_fails_before_search() -> Result<()> {
    let temp_dir = tempdir()?;

    cli()?
        .args([
            "search",
            "ubuntu +:keyword:",
            "-d",
            temp_dir.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed filter"));
    Ok(())
}

#[test]
fn test_missing_directory_fails() -> Result<()> {
    let temp_dir = tempdir()?;
    let missing = temp_dir.path().join("missing");

    cli()?
        .args(["search", "x", "-d", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
    Ok(())
}

#[test]
fn test_rank_file() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("titles.txt");
    fs::write(
        &input,
        "completely unrelated text\nUbuntu desktop iso\n\nubuntu\n",
    )?;

    let output = cli()?
        .args(["rank", "ubuntu", "-i", input.to_str().unwrap()])
        .output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("ubuntu"));
    assert!(lines[0].contains("[1 tokens, distance 0]"));
    assert!(lines[1].ends_with("Ubuntu desktop iso"));
    assert!(lines[2].ends_with("completely unrelated text"));
    Ok(())
}

#[test]
fn test_config_file_is_applied() -> Result<()> {
    let temp_dir = tempdir()?;
    create_test_files(&temp_dir, &["ubuntu.iso"])?;
    let config = temp_dir.path().join("fedscout.yaml");
    fs::write(&config, "batch_size: 0\n")?;

    cli()?
        .args([
            "--config",
            config.to_str().unwrap(),
            "search",
            "ubuntu",
            "-d",
            temp_dir.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch_size"));
    Ok(())
}
