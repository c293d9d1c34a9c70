use std::fs;

use harvester_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn nested_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("articles/feed-a/1.json", "hello").unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), "hello");
    assert!(writer.exists("articles/feed-a/1.json"));

    let second = writer.write_bytes("articles/feed-a/1.json", b"world").unwrap();
    assert_eq!(first, second);
    assert_eq!(writer.read("articles/feed-a/1.json").unwrap().as_deref(), Some("world"));
}

#[test]
fn missing_file_reads_as_none() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());
    assert_eq!(writer.read("absent.json").unwrap(), None);
}

#[test]
fn refuses_paths_outside_root() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().join("root"));
    assert!(matches!(
        writer.write("../escape.txt", "x"),
        Err(PersistError::InvalidPath(_))
    ));
    assert!(!temp.path().join("escape.txt").exists());
}

#[test]
fn no_partial_file_when_root_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("doc.md", "data").is_err());
    assert!(!file_path.with_file_name("doc.md").exists());
}
