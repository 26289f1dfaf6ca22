use clap::Parser;
use linkdupe::cli::Cli;
use linkdupe::dedup::{compare, DedupEngine, EngineConfig, Equivalence, FileDescriptor, FileOutcome};
use linkdupe::error::ExitCode;
use linkdupe::scanner::{is_same_file, Hasher, Walker, WalkerConfig};
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

#[cfg(unix)]
fn chmod(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

fn engine() -> DedupEngine<Walker> {
    DedupEngine::new(Walker::new(WalkerConfig::default()), EngineConfig::default())
}

#[test]
fn test_identical_files_share_storage() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");
    #[cfg(unix)]
    {
        chmod(&x, 0o644);
        chmod(&y, 0o644);
    }

    let mut engine = engine();
    engine.dedup(dir.path()).unwrap();

    assert!(is_same_file(&x, &y).unwrap());
    assert_eq!(fs::read(&x).unwrap(), b"hello");
    assert_eq!(fs::read(&y).unwrap(), b"hello");
    assert_eq!(engine.summary().linked, 1);
}

#[test]
fn test_same_size_different_content_stays_distinct() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"world");

    let mut engine = engine();
    engine.dedup(dir.path()).unwrap();

    assert!(!is_same_file(&x, &y).unwrap());
    assert_eq!(fs::read(&x).unwrap(), b"hello");
    assert_eq!(fs::read(&y).unwrap(), b"world");
    assert_eq!(engine.summary().linked, 0);
    assert_eq!(engine.summary().distinct, 1);
}

#[test]
#[cfg(unix)]
fn test_permission_bits_gate_linking() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");
    chmod(&x, 0o644);
    chmod(&y, 0o640);

    let mut engine = engine();
    engine.dedup(dir.path()).unwrap();

    assert!(!is_same_file(&x, &y).unwrap());
    assert_eq!(engine.summary().registered, 2);
}

#[test]
#[cfg(not(windows))]
fn test_hidden_flag_gates_linking() {
    let dir = tempdir().unwrap();
    let hidden = write(dir.path(), ".x", b"hello");
    let visible = write(dir.path(), "x", b"hello");

    let mut engine = engine();
    engine.dedup(dir.path()).unwrap();

    assert!(!is_same_file(&hidden, &visible).unwrap());
}

#[test]
fn test_nested_duplicates_link_to_first_in_walk_order() {
    let dir = tempdir().unwrap();
    let first = write(dir.path(), "a/data.bin", b"payload");
    let second = write(dir.path(), "b/data.bin", b"payload");
    let third = write(dir.path(), "b/deeper/copy.bin", b"payload");
    let other = write(dir.path(), "c/other.bin", b"different");

    let mut engine = engine();
    engine.dedup(dir.path()).unwrap();

    assert!(is_same_file(&first, &second).unwrap());
    assert!(is_same_file(&first, &third).unwrap());
    assert!(!is_same_file(&first, &other).unwrap());
    let summary = engine.summary();
    assert_eq!(summary.files_visited, 4);
    assert_eq!(summary.linked, 2);
    assert_eq!(summary.bytes_reclaimed, 14);
}

#[test]
fn test_second_run_performs_no_replacements() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x", b"hello");
    write(dir.path(), "y", b"hello");
    write(dir.path(), "z", b"hello");

    let mut first = engine();
    first.dedup(dir.path()).unwrap();
    assert_eq!(first.summary().linked, 2);

    let mut second = engine();
    second.dedup(dir.path()).unwrap();
    assert_eq!(second.summary().linked, 0);
    assert_eq!(second.summary().already_linked, 2);
}

#[test]
fn test_already_linked_pair_needs_no_digest() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = dir.path().join("y");
    fs::hard_link(&x, &y).unwrap();

    let mut engine = engine();
    assert_eq!(engine.process_file(&x).unwrap(), FileOutcome::Registered);
    assert_eq!(
        engine.process_file(&y).unwrap(),
        FileOutcome::AlreadyLinked {
            representative: x.clone()
        }
    );

    let mut dx = FileDescriptor::inspect(&x).unwrap();
    let mut dy = FileDescriptor::inspect(&y).unwrap();
    assert_eq!(compare(&mut dx, &mut dy, &Hasher::new()).unwrap(), Equivalence::SameFile);
    assert!(dx.cached_digest().is_none());
    assert!(dy.cached_digest().is_none());
}

#[test]
fn test_empty_files_are_deduplicated() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"");
    let b = write(dir.path(), "b", b"");

    let mut engine = engine();
    engine.dedup(dir.path()).unwrap();

    assert!(is_same_file(&a, &b).unwrap());
}

#[test]
#[cfg(unix)]
fn test_symlinks_are_left_alone() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&x, &link).unwrap();

    let mut engine = engine();
    engine.dedup(dir.path()).unwrap();

    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(engine.summary().files_visited, 1);
}

#[test]
fn test_min_size_and_ignore_filters() {
    let dir = tempdir().unwrap();
    let small_a = write(dir.path(), "small_a", b"hi");
    let small_b = write(dir.path(), "small_b", b"hi");
    let big_a = write(dir.path(), "big_a", b"large enough");
    let big_b = write(dir.path(), "big_b", b"large enough");
    let tmp_a = write(dir.path(), "cache/big.tmp", b"large enough");

    let walker = Walker::new(
        WalkerConfig::default()
            .with_min_size(Some(5))
            .with_ignore_patterns(vec!["cache/".to_string()]),
    );
    let mut engine = DedupEngine::new(walker, EngineConfig::default());
    engine.dedup(dir.path()).unwrap();

    assert!(is_same_file(&big_a, &big_b).unwrap());
    assert!(!is_same_file(&small_a, &small_b).unwrap());
    assert!(!is_same_file(&big_a, &tmp_a).unwrap());
}

#[test]
fn test_run_app_dedup() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let cli = Cli::try_parse_from([
        "linkdupe",
        "-q",
        "dedup",
        dir.path().to_str().unwrap(),
        "--output",
        "json",
    ])
    .unwrap();

    assert_eq!(linkdupe::run_app(cli).unwrap(), ExitCode::Success);
    assert!(is_same_file(&x, &y).unwrap());
}

#[test]
fn test_run_app_dry_run_changes_nothing() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let cli = Cli::try_parse_from([
        "linkdupe",
        "-q",
        "dedup",
        dir.path().to_str().unwrap(),
        "--dry-run",
        "--no-progress",
    ])
    .unwrap();

    assert_eq!(linkdupe::run_app(cli).unwrap(), ExitCode::Success);
    assert!(!is_same_file(&x, &y).unwrap());
}

#[test]
fn test_run_app_compare() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let cli = Cli::try_parse_from([
        "linkdupe",
        "-q",
        "compare",
        x.to_str().unwrap(),
        y.to_str().unwrap(),
        "-o",
        "json",
    ])
    .unwrap();

    assert_eq!(linkdupe::run_app(cli).unwrap(), ExitCode::Success);
    assert!(!is_same_file(&x, &y).unwrap());
}
