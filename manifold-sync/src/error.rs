//! Error types for manifold-sync.

use std::path::PathBuf;

use thiserror::Error;

use manifold_core::DocumentError;
use manifold_renderer::RenderError;

/// All errors that can arise from hashing, caching, walking, and pruning.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A document file could not be read or decoded.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// An error from the renderer.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A symlink whose target does not exist.
    #[error("broken symlink at {path} (-> {target}): {source}")]
    BrokenSymlink {
        path: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Symlinks that never reach a real file, or a directory that links back
    /// into one of its own ancestors.
    #[error("symlink loop at {path}")]
    SymlinkLoop { path: PathBuf },

    /// JSON serialization/deserialization error (aggregated hash store).
    #[error("hash store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A node definition that could not be re-encoded for its identity hash.
    #[error("cannot encode definition of node {node}: {source}")]
    Identity {
        node: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A per-node hash file that is not valid YAML.
    #[error("error reading hash from {path}: {source}")]
    SumFile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The name is reserved for hash store metadata.
    #[error("'{0}' is reserved by the hash store")]
    ReservedKey(String),

    /// Node names become directory names; separators and dot names are refused.
    #[error("invalid node name '{0}'")]
    InvalidNodeName(String),

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The per-level admission gate was closed while tasks were waiting.
    #[error("admission gate closed")]
    GateClosed,

    /// Several branches of one directory level failed.
    #[error("{} branches failed; first: {}", .0.len(), first_failure(.0))]
    Branches(Vec<SyncError>),
}

impl SyncError {
    /// Fold the failures collected at one level into a single result.
    ///
    /// Nested [`SyncError::Branches`] are flattened.
    pub fn collect(failures: Vec<SyncError>) -> Result<(), SyncError> {
        let mut flat = Vec::with_capacity(failures.len());
        for failure in failures {
            match failure {
                SyncError::Branches(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Ok(()),
            1 => Err(flat.remove(0)),
            _ => Err(SyncError::Branches(flat)),
        }
    }

    /// Every individual failure carried by this error.
    pub fn failures(&self) -> Vec<&SyncError> {
        match self {
            SyncError::Branches(inner) => inner.iter().collect(),
            other => vec![other],
        }
    }
}

fn first_failure(failures: &[SyncError]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_empty_is_ok() {
        assert!(SyncError::collect(vec![]).is_ok());
    }

    #[test]
    fn collect_single_failure_is_unwrapped() {
        let err = SyncError::collect(vec![SyncError::GateClosed]).unwrap_err();
        assert!(matches!(err, SyncError::GateClosed));
    }

    #[test]
    fn collect_flattens_nested_branches() {
        let nested = SyncError::Branches(vec![
            SyncError::ReservedKey("//".into()),
            SyncError::GateClosed,
        ]);
        let err = SyncError::collect(vec![nested, SyncError::InvalidNodeName("..".into())])
            .unwrap_err();
        assert_eq!(err.failures().len(), 3);
        assert!(err.to_string().starts_with("3 branches failed; first: '//' is reserved"));
    }
}
