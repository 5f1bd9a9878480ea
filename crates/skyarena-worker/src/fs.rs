//! Recursive directory deletion, the canonical pool job.

use std::fs;
use std::io;
use std::path::Path;

use crate::WorkerScratch;

/// What [`delete_tree`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedTree {
    pub files: u64,
    pub dirs: u64,
}

/// Removes `root` and everything below it.
///
/// A missing `root` is not an error: an arena that never had its world
/// copied in still has to be deletable. Symlinks are removed, never
/// followed. Traversal state lives in the worker's scratch buffers.
pub fn delete_tree(root: &Path, scratch: &mut WorkerScratch) -> io::Result<DeletedTree> {
    let mut deleted = DeletedTree::default();

    let meta = match fs::symlink_metadata(root) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(deleted),
        Err(e) => return Err(e),
    };
    if !meta.is_dir() {
        fs::remove_file(root)?;
        deleted.files += 1;
        return Ok(deleted);
    }

    scratch.dirs.clear();
    scratch.visited.clear();
    scratch.dirs.push(root.to_path_buf());

    while let Some(dir) = scratch.dirs.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                scratch.dirs.push(path);
            } else {
                fs::remove_file(&path)?;
                deleted.files += 1;
            }
        }
        scratch.visited.push(dir);
    }

    // Children were pushed after their parents.
    while let Some(dir) = scratch.visited.pop() {
        fs::remove_dir(&dir)?;
        deleted.dirs += 1;
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_tree_removes_nested_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let world = tmp.path().join("world");
        fs::create_dir_all(world.join("region/sub")).unwrap();
        fs::write(world.join("level.dat"), b"lvl").unwrap();
        fs::write(world.join("region/r.0.0.mca"), b"chunk").unwrap();
        fs::write(world.join("region/sub/x"), b"x").unwrap();

        let mut scratch = WorkerScratch::default();
        let deleted = delete_tree(&world, &mut scratch).unwrap();

        assert!(!world.exists());
        assert_eq!(deleted, DeletedTree { files: 3, dirs: 3 });
        assert!(tmp.path().exists(), "parent must survive");
    }

    #[test]
    fn test_delete_tree_missing_root_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let mut scratch = WorkerScratch::default();

        let deleted = delete_tree(&tmp.path().join("absent"), &mut scratch).unwrap();

        assert_eq!(deleted, DeletedTree::default());
    }

    #[test]
    fn test_delete_tree_plain_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("lonely.dat");
        fs::write(&file, b"1").unwrap();
        let mut scratch = WorkerScratch::default();

        let deleted = delete_tree(&file, &mut scratch).unwrap();

        assert_eq!(deleted.files, 1);
        assert!(!file.exists());
    }
}
