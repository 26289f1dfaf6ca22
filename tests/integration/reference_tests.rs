use clap::Parser;
use linkdupe::cli::Cli;
use linkdupe::dedup::{DedupEngine, EngineConfig, FileOutcome, Origin};
use linkdupe::error::ExitCode;
use linkdupe::scanner::{is_same_file, Walker, WalkerConfig};
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

fn engine() -> DedupEngine<Walker> {
    DedupEngine::new(Walker::new(WalkerConfig::default()), EngineConfig::default())
}

#[test]
fn test_target_links_to_reference() {
    let dir = tempdir().unwrap();
    let r = write(dir.path(), "reference/r", b"A");
    let t = write(dir.path(), "target/t", b"A");
    let before = fs::metadata(&r).unwrap().modified().unwrap();

    let mut engine = engine();
    engine.index_readonly(&[dir.path().join("reference")]).unwrap();
    engine.dedup(&dir.path().join("target")).unwrap();

    assert!(is_same_file(&r, &t).unwrap());
    assert_eq!(fs::read(&r).unwrap(), b"A");
    assert_eq!(fs::metadata(&r).unwrap().modified().unwrap(), before);
    assert!(dir.path().join("reference/r").exists());
}

#[test]
fn test_reference_duplicates_are_not_linked_together() {
    let dir = tempdir().unwrap();
    let r1 = write(dir.path(), "reference/r1", b"same");
    let r2 = write(dir.path(), "reference/r2", b"same");

    let mut engine = engine();
    engine.index_readonly(&[dir.path().join("reference")]).unwrap();

    assert!(!is_same_file(&r1, &r2).unwrap());
    assert_eq!(engine.summary().linked, 0);
    assert_eq!(engine.summary().already_indexed, 1);
    assert_eq!(engine.summary().already_linked, 0);
    assert_eq!(engine.index().len(), 1);
}

#[test]
fn test_earliest_reference_wins() {
    let dir = tempdir().unwrap();
    let first = write(dir.path(), "ref_b/file", b"shared");
    let second = write(dir.path(), "ref_a/file", b"shared");
    let target = write(dir.path(), "target/file", b"shared");

    let mut engine = engine();
    engine
        .index_readonly(&[dir.path().join("ref_b"), dir.path().join("ref_a")])
        .unwrap();
    engine.dedup(&dir.path().join("target")).unwrap();

    assert!(is_same_file(&first, &target).unwrap());
    assert!(!is_same_file(&second, &target).unwrap());
}

#[test]
fn test_reference_preferred_over_target_copy() {
    let dir = tempdir().unwrap();
    let r = write(dir.path(), "reference/z_late_name", b"content");
    let t1 = write(dir.path(), "target/a", b"content");
    let t2 = write(dir.path(), "target/b", b"content");

    let mut engine = engine();
    engine.index_readonly(&[dir.path().join("reference")]).unwrap();
    let key = *linkdupe::dedup::FileDescriptor::inspect(&r).unwrap().key();
    assert_eq!(engine.index().representatives(&key)[0].origin, Origin::Reference);

    assert_eq!(
        engine.process_file(&t1).unwrap(),
        FileOutcome::Linked {
            representative: r.clone(),
            bytes: 7
        }
    );
    engine.process_file(&t2).unwrap();

    assert!(is_same_file(&r, &t1).unwrap());
    assert!(is_same_file(&r, &t2).unwrap());
    assert_eq!(engine.index().len(), 1);
}

#[test]
fn test_missing_reference_is_an_error() {
    let dir = tempdir().unwrap();
    write(dir.path(), "target/t", b"A");

    let cli = Cli::try_parse_from([
        "linkdupe",
        "-q",
        "dedup",
        dir.path().join("target").to_str().unwrap(),
        "--reference",
        dir.path().join("nope").to_str().unwrap(),
    ])
    .unwrap();

    let err = linkdupe::run_app(cli).unwrap_err();
    assert!(format!("{:#}", err).contains("reference"));
}

#[test]
fn test_run_app_with_reference() {
    let dir = tempdir().unwrap();
    let r = write(dir.path(), "reference/r", b"A");
    let t = write(dir.path(), "target/t", b"A");

    let cli = Cli::try_parse_from([
        "linkdupe",
        "-q",
        "dedup",
        dir.path().join("target").to_str().unwrap(),
        "-r",
        dir.path().join("reference").to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(linkdupe::run_app(cli).unwrap(), ExitCode::Success);
    assert!(is_same_file(&r, &t).unwrap());
}
