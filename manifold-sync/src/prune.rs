//! Removal of node outputs that no walk reached.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{io_err, SyncError};

/// Output directories claimed by nodes during one walk.
#[derive(Debug, Default)]
pub struct VisitedSet {
    paths: Mutex<HashSet<PathBuf>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `path` was already claimed.
    pub fn insert(&self, path: PathBuf) -> bool {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Delete every directory directly under `output` that is not in `visited`.
///
/// Regular files (such as `hashes.json`) are left alone. Returns the removed
/// directories, sorted.
pub fn prune_unvisited(visited: &VisitedSet, output: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let entries = std::fs::read_dir(output).map_err(|e| io_err(output, e))?;

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(output, e))?;
        let file_type = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        let path = output.join(entry.file_name());
        if visited.contains(&path) {
            continue;
        }
        tracing::info!(path = %path.display(), "removing unreferenced output");
        std::fs::remove_dir_all(&path).map_err(|e| io_err(&path, e))?;
        removed.push(path);
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn insert_reports_duplicates() {
        let visited = VisitedSet::new();
        assert!(visited.is_empty());
        assert!(visited.insert(PathBuf::from("out/a")));
        assert!(!visited.insert(PathBuf::from("out/a")));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn removes_only_unvisited_directories() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path();
        for dir in ["keep", "drop-a", "drop-b"] {
            fs::create_dir_all(out.join(dir).join("nested")).unwrap();
        }
        fs::write(out.join("hashes.json"), "{}").unwrap();

        let visited = VisitedSet::new();
        visited.insert(out.join("keep"));

        let removed = prune_unvisited(&visited, out).unwrap();
        assert_eq!(removed, vec![out.join("drop-a"), out.join("drop-b")]);
        assert!(out.join("keep/nested").exists());
        assert!(out.join("hashes.json").exists());
    }
}
