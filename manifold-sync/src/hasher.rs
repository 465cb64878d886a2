//! Content fingerprints for application nodes.
//!
//! A node's digest covers three inputs, each as one hex line fed to a final
//! SHA-256:
//! 1. the node's own definition (identity)
//! 2. the tree under its source path, when it has one
//! 3. its value files, when it declares any
//!
//! Trees are hashed as a sorted listing of `"<file sha256>  <relative path>\n"`
//! lines, so directory enumeration order never leaks into the digest. Paths
//! are recorded relative to the hashed root as walked, while content is read
//! from wherever symlinks finally point.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use manifold_core::{is_ignored_value_file, ApplicationNode, SourceKind};

use crate::error::{io_err, SyncError};

const MAX_SYMLINK_HOPS: usize = 40;

/// Result of fingerprinting one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// Hex-encoded SHA-256 digest.
    Computed(String),
    /// The node's source kind is never rendered, so it has no digest.
    Unsupported,
}

/// Computes node fingerprints with paths resolved against `workdir`.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    workdir: PathBuf,
    ignore_value_file: Option<String>,
}

impl ContentHasher {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        ContentHasher {
            workdir: workdir.into(),
            ignore_value_file: None,
        }
    }

    /// Value files whose path contains `pattern` are left out of the digest.
    /// An empty pattern disables the filter.
    pub fn with_ignore_value_file(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.ignore_value_file = (!pattern.is_empty()).then_some(pattern);
        self
    }

    /// Fingerprint `node`.
    pub fn fingerprint(&self, node: &ApplicationNode) -> Result<Fingerprint, SyncError> {
        if node.source_kind() == SourceKind::Unsupported {
            return Ok(Fingerprint::Unsupported);
        }

        let mut digest = Sha256::new();
        digest.update(hex_line(&identity_digest(node)?));

        let source = node.source_path();
        if !source.is_empty() {
            digest.update(hex_line(&self.hash_tree(Path::new(source))?));
        }

        if !node.value_files().is_empty() {
            digest.update(hex_line(&self.values_digest(node)?));
        }

        Ok(Fingerprint::Computed(hex::encode(digest.finalize())))
    }

    fn values_digest(&self, node: &ApplicationNode) -> Result<[u8; 32], SyncError> {
        let mut values = Sha256::new();
        for file in node.value_files() {
            if is_ignored_value_file(file, self.ignore_value_file.as_deref()) {
                tracing::debug!(node = node.name(), file = %file, "value file ignored");
                continue;
            }
            let path = Path::new(strip_parent_segments(file));
            if node.ignore_missing_value_files() && !self.exists(path)? {
                tracing::debug!(node = node.name(), file = %file, "missing value file skipped");
                continue;
            }
            values.update(hex_line(&self.hash_tree(path)?));
        }
        Ok(values.finalize().into())
    }

    /// Hash the file or directory at `path` (relative to the workdir).
    ///
    /// A single regular file hashes to its own content digest. A symlinked
    /// root hashes the same as its target.
    pub fn hash_tree(&self, path: &Path) -> Result<[u8; 32], SyncError> {
        let root = resolve_symlink(&self.workdir.join(path))?;
        let mut sums = BTreeMap::new();
        let mut ancestors = Vec::new();
        collect(&root, Path::new(""), &mut sums, &mut ancestors)?;

        if let (1, Some(sum)) = (sums.len(), sums.values().next()) {
            return Ok(*sum);
        }

        let mut tree = Sha256::new();
        for (name, sum) in &sums {
            tree.update(format!("{}  {}\n", hex::encode(sum), name));
        }
        Ok(tree.finalize().into())
    }

    fn exists(&self, path: &Path) -> Result<bool, SyncError> {
        let full = self.workdir.join(path);
        match std::fs::metadata(&full) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_err(full, err)),
        }
    }
}

/// SHA-256 of a single file's bytes.
pub fn hash_file(path: &Path) -> Result<[u8; 32], SyncError> {
    let content = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(Sha256::digest(&content).into())
}

/// Follow `path` through any chain of symlinks to a non-link entry.
pub fn resolve_symlink(path: &Path) -> Result<PathBuf, SyncError> {
    let mut current = path.to_path_buf();
    for _ in 0..MAX_SYMLINK_HOPS {
        let meta = std::fs::symlink_metadata(&current).map_err(|e| io_err(&current, e))?;
        if !meta.file_type().is_symlink() {
            return Ok(current);
        }

        let target = std::fs::read_link(&current).map_err(|e| io_err(&current, e))?;
        let next = match current.parent() {
            Some(parent) if target.is_relative() => parent.join(&target),
            _ => target.clone(),
        };
        if let Err(source) = std::fs::symlink_metadata(&next) {
            return Err(SyncError::BrokenSymlink {
                path: current,
                target,
                source,
            });
        }
        current = next;
    }
    Err(SyncError::SymlinkLoop { path: path.to_path_buf() })
}

/// `../../overrides/x.yaml` -> `overrides/x.yaml`
pub fn strip_parent_segments(file: &str) -> &str {
    let mut rest = file;
    while let Some(stripped) = rest.strip_prefix("../") {
        rest = stripped;
    }
    rest
}

fn collect(
    path: &Path,
    name: &Path,
    sums: &mut BTreeMap<String, [u8; 32]>,
    ancestors: &mut Vec<PathBuf>,
) -> Result<(), SyncError> {
    let meta = std::fs::metadata(path).map_err(|e| io_err(path, e))?;

    if meta.is_file() {
        sums.insert(normalize_name(name), hash_file(path)?);
        return Ok(());
    }
    if !meta.is_dir() {
        return Ok(());
    }

    let canonical = std::fs::canonicalize(path).map_err(|e| io_err(path, e))?;
    if ancestors.contains(&canonical) {
        return Err(SyncError::SymlinkLoop { path: path.to_path_buf() });
    }
    ancestors.push(canonical);

    let entries = std::fs::read_dir(path).map_err(|e| io_err(path, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(path, e))?;
        let child = resolve_symlink(&entry.path())?;
        collect(&child, &name.join(entry.file_name()), sums, ancestors)?;
    }

    ancestors.pop();
    Ok(())
}

fn identity_digest(node: &ApplicationNode) -> Result<[u8; 32], SyncError> {
    let encoded = if node.definition.is_null() {
        serde_yaml::to_string(node)
    } else {
        serde_yaml::to_string(&node.definition)
    }
    .map_err(|source| SyncError::Identity {
        node: node.name().to_string(),
        source,
    })?;
    Ok(Sha256::digest(encoded.as_bytes()).into())
}

fn hex_line(sum: &[u8; 32]) -> String {
    format!("{}\n", hex::encode(sum))
}

fn normalize_name(name: &Path) -> String {
    name.to_string_lossy().replace('\\', "/")
}
