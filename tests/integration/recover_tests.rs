use clap::Parser;
use linkdupe::cli::Cli;
use linkdupe::dedup::replace::{parked_path, LinkOps, StdLinkOps};
use linkdupe::dedup::{
    recover_parked, DedupEngine, DedupError, EngineConfig, RecoveryAction,
};
use linkdupe::error::ExitCode;
use linkdupe::scanner::{is_same_file, Hasher, Walker, WalkerConfig};
use std::cell::Cell;
use std::fs;
use std::io;
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

/// Parks the duplicate, then "crashes": both the link and the way back fail.
#[derive(Default)]
struct CrashAfterPark {
    renames: Cell<usize>,
}

impl LinkOps for CrashAfterPark {
    fn entry_exists(&self, path: &Path) -> io::Result<bool> {
        StdLinkOps.entry_exists(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.renames.set(self.renames.get() + 1);
        if self.renames.get() > 1 {
            return Err(io::Error::other("crashed"));
        }
        StdLinkOps.rename(from, to)
    }

    fn hard_link(&self, _original: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::other("crashed"))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        StdLinkOps.remove_file(path)
    }
}

#[test]
fn test_interrupted_replacement_is_recovered() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let mut engine = DedupEngine::new(Walker::new(WalkerConfig::default()), EngineConfig::default())
        .with_link_ops(CrashAfterPark::default());
    engine.dedup(dir.path()).unwrap();

    let summary = engine.into_summary();
    assert_eq!(summary.failure_count(), 1);
    assert_eq!(summary.failures[0].path, y);
    assert!(!y.exists());

    let report = recover_parked(dir.path(), &Hasher::new()).unwrap();

    assert_eq!(report.count(RecoveryAction::Restored), 1);
    assert_eq!(fs::read(&y).unwrap(), b"hello");
    assert!(!is_same_file(&x, &y).unwrap());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn test_strict_mode_surfaces_stranded_file() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let mut engine = DedupEngine::new(
        Walker::new(WalkerConfig::default()),
        EngineConfig::default().with_strict(true),
    )
    .with_link_ops(CrashAfterPark::default());

    let err = engine.dedup(dir.path()).unwrap_err();

    assert!(matches!(err, DedupError::Restore { .. }));
    let parked = err.parked_file().unwrap();
    assert_eq!(parked.parent(), y.parent());
    assert_eq!(fs::read(parked).unwrap(), b"hello");
}

#[test]
fn test_parked_files_are_not_deduplicated() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let parked = parked_path(&dir.path().join("y"), 1234).unwrap();
    fs::write(&parked, b"hello").unwrap();

    let mut engine = DedupEngine::new(Walker::new(WalkerConfig::default()), EngineConfig::default());
    engine.dedup(dir.path()).unwrap();

    assert_eq!(engine.summary().files_visited, 1);
    assert!(!is_same_file(&x, &parked).unwrap());
}

#[test]
fn test_leftover_after_successful_link_is_cleaned() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = dir.path().join("y");
    fs::hard_link(&x, &y).unwrap();
    let parked = parked_path(&y, 99).unwrap();
    fs::write(&parked, b"hello").unwrap();

    let report = recover_parked(dir.path(), &Hasher::new()).unwrap();

    assert_eq!(report.count(RecoveryAction::Cleaned), 1);
    assert!(!parked.exists());
    assert!(is_same_file(&x, &y).unwrap());
}

#[test]
fn test_run_app_recover_reports_conflicts() {
    let dir = tempdir().unwrap();
    write(dir.path(), "y", b"new content");
    let parked = write(dir.path(), "y.7.aside", b"old content");

    let cli = Cli::try_parse_from([
        "linkdupe",
        "-q",
        "recover",
        dir.path().to_str().unwrap(),
        "--output",
        "json",
    ])
    .unwrap();

    assert_eq!(linkdupe::run_app(cli).unwrap(), ExitCode::PartialSuccess);
    assert!(parked.exists());
}
