//! Error types for manifold-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from reading application documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document file could not be read.
    #[error("error reading document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML/JSON decode failure, with the line context serde_yaml reports.
    #[error("document decode failed for {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
