//! Basic tests for FileSystem implementations.

use depshift_fs::{FileSystem, MemoryFileSystem, NativeFileSystem};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_native_read_write() {
    let temp_dir = TempDir::new().unwrap();
    let fs = NativeFileSystem::new(temp_dir.path()).unwrap();

    let test_file = temp_dir.path().join("package.json");
    fs.write(&test_file, "{\n  \"name\": \"x\"\n}\n").unwrap();

    let read_contents = fs.read_to_string(&test_file).unwrap();
    assert_eq!(read_contents, "{\n  \"name\": \"x\"\n}\n");
}

#[test]
fn test_native_exists_and_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let fs = NativeFileSystem::new(temp_dir.path()).unwrap();

    let test_file = temp_dir.path().join("yarn.lock");
    assert!(!fs.exists(&test_file).unwrap());

    fs.write(&test_file, "# yarn lockfile v1\n").unwrap();
    assert!(fs.exists(&test_file).unwrap());

    let metadata = fs.metadata(&test_file).unwrap();
    assert!(metadata.is_file);
    assert!(!metadata.is_dir);
    assert_eq!(metadata.size, "# yarn lockfile v1\n".len() as u64);

    assert!(fs.is_dir(temp_dir.path()).unwrap());
}

#[test]
fn test_native_glob_relative_to_root() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("packages/a")).unwrap();
    fs::create_dir_all(temp_dir.path().join("packages/b")).unwrap();
    fs::write(temp_dir.path().join("packages/a/package.json"), "{}").unwrap();
    fs::write(temp_dir.path().join("packages/b/package.json"), "{}").unwrap();

    let fs = NativeFileSystem::new(temp_dir.path()).unwrap();
    let matches = fs.glob("packages/*/package.json").unwrap();

    let names: Vec<PathBuf> = matches
        .iter()
        .map(|p| p.strip_prefix(fs.project_root()).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        names,
        vec![
            PathBuf::from("packages/a/package.json"),
            PathBuf::from("packages/b/package.json")
        ]
    );
}

#[test]
fn test_memory_read_write_shared_between_clones() {
    let fs = MemoryFileSystem::new("/project").unwrap();
    let handle = fs.clone();

    fs.write(Path::new("/project/package.json"), "{}").unwrap();
    assert_eq!(
        handle.read_to_string(Path::new("package.json")).unwrap(),
        "{}"
    );
}

#[test]
fn test_memory_glob() {
    let fs = MemoryFileSystem::new("/repo")
        .unwrap()
        .with_file("packages/a/package.json", "{}")
        .unwrap()
        .with_file("packages/b/package.json", "{}")
        .unwrap()
        .with_file("packages/b/README.md", "")
        .unwrap();

    let matches = fs.glob("packages/*/package.json").unwrap();
    assert_eq!(
        matches,
        vec![
            PathBuf::from("/repo/packages/a/package.json"),
            PathBuf::from("/repo/packages/b/package.json")
        ]
    );
}
