use clap::Parser;
use linkdupe::cli::Cli;
use linkdupe::config::{Config, ConfigError};
use linkdupe::dedup::BucketPolicy;
use linkdupe::error::ExitCode;
use linkdupe::scanner::is_same_file;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn dedup_with_config(target: &Path, config: &Path, extra: &[&str]) -> anyhow::Result<ExitCode> {
    let mut args = vec![
        "linkdupe",
        "-q",
        "--config",
        config.to_str().unwrap(),
        "dedup",
        target.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    linkdupe::run_app(Cli::try_parse_from(args).unwrap())
}

#[test]
fn test_config_file_is_loaded() {
    let dir = tempdir().unwrap();
    let config_path = write(
        dir.path(),
        "linkdupe.toml",
        br#"
bucket_policy = "single"
min_size = 3
"#,
    );

    let config = Config::load(Some(&config_path)).unwrap();

    assert_eq!(config.bucket_policy, BucketPolicy::Single);
    assert_eq!(config.min_size, Some(3));
    assert!(!config.dry_run);
}

#[test]
fn test_config_file_drives_run() {
    let dir = tempdir().unwrap();
    let config_path = write(dir.path(), "linkdupe.toml", b"dry_run = true\n");
    let target = dir.path().join("target");
    let x = write(&target, "x", b"hello");
    let y = write(&target, "y", b"hello");

    assert_eq!(dedup_with_config(&target, &config_path, &[]).unwrap(), ExitCode::Success);
    assert!(!is_same_file(&x, &y).unwrap());
}

#[test]
fn test_ignore_patterns_from_file_and_cli_combine() {
    let dir = tempdir().unwrap();
    let config_path = write(dir.path(), "linkdupe.toml", b"ignore_patterns = [\"*.tmp\"]\n");
    let target = dir.path().join("target");
    let a = write(&target, "a.dat", b"hello");
    let b = write(&target, "b.tmp", b"hello");
    let c = write(&target, "c.log", b"hello");
    let d = write(&target, "d.dat", b"hello");

    dedup_with_config(&target, &config_path, &["-i", "*.log"]).unwrap();

    assert!(is_same_file(&a, &d).unwrap());
    assert!(!is_same_file(&a, &b).unwrap());
    assert!(!is_same_file(&a, &c).unwrap());
}

#[test]
fn test_invalid_config_is_fatal() {
    let dir = tempdir().unwrap();
    let config_path = write(dir.path(), "linkdupe.toml", b"strict = \"sometimes\"\n");
    let target = dir.path().join("target");
    let x = write(&target, "x", b"hello");
    let y = write(&target, "y", b"hello");

    let err = dedup_with_config(&target, &config_path, &[]).unwrap_err();

    assert!(err.downcast_ref::<ConfigError>().is_some());
    assert!(!is_same_file(&x, &y).unwrap());
}

#[test]
fn test_missing_config_file_is_fatal() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target");
    write(&target, "x", b"hello");

    let err = dedup_with_config(&target, &dir.path().join("absent.toml"), &[]).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NotFound(_))
    ));
}
