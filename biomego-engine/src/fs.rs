//! Host file-tree helpers shared by the engines

use biomego_core::Snapshot;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{EngineError, Result};

/// Reads every regular file under `root` into a snapshot
///
/// Paths are relative to `root` and `/`-separated. Symlinks are not followed.
pub fn read_tree(root: &Path) -> Result<Snapshot> {
    if !root.is_dir() {
        return Err(EngineError::Mount(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| EngineError::Mount(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| EngineError::Mount(e.to_string()))?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push((key, std::fs::read(entry.path())?));
    }

    Ok(files.into_iter().collect())
}

/// Writes a snapshot's files under `root`, creating parent directories
pub fn write_tree(snapshot: &Snapshot, root: &Path) -> Result<()> {
    for (path, contents) in snapshot.files() {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, contents)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tree_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested/deep")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        std::fs::write(dir.path().join("nested/deep/b.txt"), "bye").unwrap();

        let snapshot = read_tree(dir.path()).unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.file("a.txt"), Some(&b"hello world"[..]));
        assert_eq!(snapshot.file("nested/deep/b.txt"), Some(&b"bye"[..]));
    }

    #[test]
    fn test_read_tree_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_tree(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, EngineError::Mount(_)));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::new()
            .with_new_file("src/index.ts", "export {}")
            .with_new_file("package.json", "{}");

        write_tree(&snapshot, dir.path()).unwrap();

        assert_eq!(read_tree(dir.path()).unwrap(), snapshot);
    }
}
