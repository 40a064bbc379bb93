//! Integration tests for the `station` binary
//!
//! Only commands that need no object store are exercised end to end; the
//! store-backed commands are checked for how they fail without one.

use anyhow::Result;
use std::process::{Command, Output};
use tempfile::TempDir;

const STORE_VARS: &[&str] = &[
    "S3_ENDPOINT",
    "S3_REGION",
    "S3_ACCESS_KEY_ID",
    "S3_SECRET_ACCESS_KEY",
    "S3_BUCKET",
    "S3_PUBLIC_URL_BASE",
    "STATION_CACHE_TTL_MS",
];

/// Run the station binary with an isolated environment
fn run_station(args: &[&str]) -> Result<(TempDir, Output)> {
    let home = TempDir::new()?;

    let mut command = Command::new(env!("CARGO_BIN_EXE_station"));
    command
        .args(args)
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"));
    for var in STORE_VARS {
        command.env_remove(var);
    }

    let output = command.output()?;
    Ok((home, output))
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Cell contents of one table row, borders stripped
fn row_cells(line: &str) -> Vec<&str> {
    line.split('│')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect()
}

#[test]
fn test_sort_prints_catalog_order() -> Result<()> {
    let (_home, output) = run_station(&["sort", "25.4.214123.zh", "25.4.215555.zh", "9", "10"])?;
    assert!(output.status.success());

    let lines = stdout_lines(&output);
    let zh_new = lines.iter().position(|l| l == "25.4.215555.zh").unwrap();
    let zh_old = lines.iter().position(|l| l == "25.4.214123.zh").unwrap();
    assert!(zh_new < zh_old);
    Ok(())
}

#[test]
fn test_sort_semver() -> Result<()> {
    let (_home, output) = run_station(&["sort", "1.0.0", "1.10.0", "1.2.0", "1.0.0-rc.1"])?;
    assert!(output.status.success());
    assert_eq!(
        stdout_lines(&output),
        vec!["1.10.0", "1.2.0", "1.0.0", "1.0.0-rc.1"]
    );
    Ok(())
}

#[test]
fn test_check_version_table() -> Result<()> {
    let (_home, output) = run_station(&[
        "check-version",
        "1.2.3",
        "1.20.1-forge",
        "25.4.214123.zh",
        "1.2",
        "nightly",
    ])?;
    assert!(output.status.success());

    let expected = [
        ("1.2.3", "semantic"),
        ("1.20.1-forge", "semantic"),
        ("25.4.214123.zh", "numeric-like"),
        ("1.2", "numeric-like"),
        ("nightly", "opaque"),
    ];
    let lines = stdout_lines(&output);
    for (version, class) in expected {
        let row = lines
            .iter()
            .find(|line| row_cells(line).first() == Some(&version))
            .unwrap_or_else(|| panic!("no row for {version}"));
        assert_eq!(row_cells(row)[1], class, "class of {version}");
    }
    Ok(())
}

#[test]
fn test_put_rejects_invalid_version() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = dir.path().join("archive.zip");
    std::fs::write(&archive, b"zip")?;

    let (_home, output) = run_station(&[
        "put",
        "foo",
        "release-candidate",
        archive.to_str().unwrap(),
    ])?;

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid version"));
    Ok(())
}

#[test]
fn test_list_without_configuration_fails() -> Result<()> {
    let (_home, output) = run_station(&["list"])?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("S3_ENDPOINT"));
    Ok(())
}

#[test]
fn test_get_with_missing_config_file_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let config = dir.path().join("nope.yaml");

    let (_home, output) = run_station(&[
        "get",
        "foo",
        "latest",
        "--config",
        config.to_str().unwrap(),
    ])?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load station configuration"));
    Ok(())
}
