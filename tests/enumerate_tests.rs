//! Integration tests for directory enumeration.
//!
//! These tests build real directories with tempfile and check the task
//! list that comes out of them.

mod common;

use std::collections::HashSet;
use std::fs;

use dirpush::enumerate::{enumerate, object_key};
use dirpush::errors::ListingError;
use dirpush::models::UploadTask;

use common::create_source_dir;

#[test]
fn test_two_files_under_prefix() {
    let dir = create_source_dir(&[("b.txt", "bee"), ("a.txt", "ay")]);

    let tasks = enumerate(dir.path(), "backups").unwrap();

    assert_eq!(
        tasks,
        vec![
            UploadTask::new(dir.path().join("a.txt"), "backups/a.txt"),
            UploadTask::new(dir.path().join("b.txt"), "backups/b.txt"),
        ]
    );
}

#[test]
fn test_one_task_per_file() {
    let names: Vec<String> = (0..25).map(|i| format!("part-{:02}.csv", i)).collect();
    let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "x")).collect();
    let dir = create_source_dir(&files);
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested").join("inner.csv"), "y").unwrap();

    let tasks = enumerate(dir.path(), "exports/2024").unwrap();

    assert_eq!(tasks.len(), 25);
    let mut keys: Vec<&str> = tasks.iter().map(|t| t.destination_key()).collect();
    keys.dedup();
    assert_eq!(keys.len(), 25);
    assert!(keys.iter().all(|k| k.starts_with("exports/2024/part-")));
    assert!(tasks.iter().all(|t| t.source_path().is_file()));
}

#[test]
fn test_enumeration_is_idempotent() {
    let dir = create_source_dir(&[("z.log", "1"), ("m.log", "2"), ("a.log", "3")]);

    let first = enumerate(dir.path(), "logs").unwrap();
    let second = enumerate(dir.path(), "logs").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_directory_is_not_an_error() {
    let dir = create_source_dir(&[]);
    assert!(enumerate(dir.path(), "backups").unwrap().is_empty());
}

#[test]
fn test_missing_directory_is_listing_error() {
    let dir = create_source_dir(&[]);
    let missing = dir.path().join("gone");

    match enumerate(&missing, "backups") {
        Err(ListingError::NotFound(path)) => assert_eq!(path, missing),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_prefix_separators_normalised() {
    let dir = create_source_dir(&[("data.bin", "0")]);

    let tasks = enumerate(dir.path(), "\\nightly\\\\2024/").unwrap();
    assert_eq!(tasks[0].destination_key(), "nightly/2024/data.bin");

    let tasks = enumerate(dir.path(), "").unwrap();
    assert_eq!(tasks[0].destination_key(), "data.bin");
}

#[test]
fn test_object_key_examples() {
    assert_eq!(object_key("backups", "a.txt"), "backups/a.txt");
    assert_eq!(object_key("backups/", "a.txt"), "backups/a.txt");
    assert_eq!(object_key("/root/./logs", "a.txt"), "root/logs/a.txt");
    assert_eq!(object_key("a/b/../c", "f"), "a/c/f");
    assert_eq!(object_key("win\\style", "f.txt"), "win/style/f.txt");
}

#[cfg(unix)]
#[test]
fn test_backslash_names_keep_distinct_keys() {
    let dir = create_source_dir(&[
        ("x\\y.txt", "1"),
        ("x\\.\\y.txt", "2"),
        ("..\\..\\evil.txt", "3"),
    ]);

    let tasks = enumerate(dir.path(), "backups").unwrap();
    let keys: HashSet<&str> = tasks.iter().map(|t| t.destination_key()).collect();

    assert_eq!(tasks.len(), 3);
    assert_eq!(keys.len(), 3);
    assert!(keys.contains("backups/x/y.txt"));
    assert!(keys.contains("backups/x/./y.txt"));
    assert!(keys.iter().all(|k| k.starts_with("backups/")));
}
