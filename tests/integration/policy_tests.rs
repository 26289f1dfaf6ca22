use linkdupe::dedup::{BucketPolicy, DedupEngine, EngineConfig};
use linkdupe::scanner::{is_same_file, PathList, Walker, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// `a` holds one content, `b` and `c` another, all with the same key.
fn colliding_tree(root: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (
        write(root, "a", b"first"),
        write(root, "b", b"other"),
        write(root, "c", b"other"),
    )
}

fn run(root: &Path, policy: BucketPolicy) -> DedupEngine<Walker> {
    let mut engine = DedupEngine::new(
        Walker::new(WalkerConfig::default()),
        EngineConfig::default().with_bucket_policy(policy),
    );
    engine.dedup(root).unwrap();
    engine
}

#[test]
fn test_single_policy_keeps_one_representative() {
    let dir = tempdir().unwrap();
    let (a, b, c) = colliding_tree(dir.path());

    let engine = run(dir.path(), BucketPolicy::Single);

    assert!(!is_same_file(&b, &c).unwrap());
    assert!(!is_same_file(&a, &c).unwrap());
    assert_eq!(engine.index().len(), 1);
    assert_eq!(engine.summary().distinct, 2);
    assert_eq!(engine.summary().linked, 0);
}

#[test]
fn test_multi_policy_links_later_collisions() {
    let dir = tempdir().unwrap();
    let (a, b, c) = colliding_tree(dir.path());

    let engine = run(dir.path(), BucketPolicy::Multi);

    assert!(is_same_file(&b, &c).unwrap());
    assert!(!is_same_file(&a, &b).unwrap());
    assert_eq!(engine.index().len(), 2);
    assert_eq!(engine.index().bucket_count(), 1);
    assert_eq!(engine.summary().linked, 1);
}

#[test]
fn test_independent_engines_share_no_state() {
    let dir = tempdir().unwrap();
    let first = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(first.path(), "y", b"hello");

    let mut one = DedupEngine::new(PathList::new(vec![x.clone()]), EngineConfig::default());
    one.dedup(dir.path()).unwrap();
    let mut two = DedupEngine::new(PathList::new(vec![y.clone()]), EngineConfig::default());
    two.dedup(first.path()).unwrap();

    assert_eq!(one.index().len(), 1);
    assert_eq!(two.index().len(), 1);
    assert_eq!(two.summary().linked, 0);
    assert!(!is_same_file(&x, &y).unwrap());
}

#[test]
fn test_synthetic_file_order_decides_representative() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"hello");
    let b = write(dir.path(), "b", b"hello");

    // Reverse order: `b` becomes the representative.
    let mut engine = DedupEngine::new(
        PathList::new(vec![b.clone(), a.clone()]),
        EngineConfig::default(),
    );
    engine.dedup(dir.path()).unwrap();

    let key = *linkdupe::dedup::FileDescriptor::inspect(&b).unwrap().key();
    assert_eq!(engine.index().representatives(&key)[0].path, b);
    assert!(is_same_file(&a, &b).unwrap());
}
