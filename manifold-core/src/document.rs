//! Multi-document YAML/JSON reader.
//!
//! A document file may hold any number of `---` separated documents. Only
//! documents whose `kind` is [`APPLICATION_KIND`] become nodes; everything
//! else (rendered Deployments, ConfigMaps, empty documents) is skipped
//! without error.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::DocumentError;
use crate::types::{ApplicationNode, APPLICATION_KIND};

/// Marker a file name must contain to be read as a document file.
pub const DOCUMENT_MARKER: &str = ".yaml";

/// Whether a directory entry name looks like a document file.
pub fn is_document_file(file_name: &str) -> bool {
    file_name.contains(DOCUMENT_MARKER)
}

/// Read every application node declared in the file at `path`.
pub fn read(path: &Path) -> Result<Vec<ApplicationNode>, DocumentError> {
    let contents = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_str(&contents, path)
}

/// Parse application nodes out of `contents`; `path` is used for error context.
pub fn parse_str(contents: &str, path: &Path) -> Result<Vec<ApplicationNode>, DocumentError> {
    let parse_err = |source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut nodes = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(contents) {
        let value = Value::deserialize(doc).map_err(parse_err)?;
        if !is_application(&value) {
            continue;
        }
        let mut node: ApplicationNode = serde_yaml::from_value(value.clone()).map_err(parse_err)?;
        node.definition = value;
        nodes.push(node);
    }
    Ok(nodes)
}

fn is_application(value: &Value) -> bool {
    value.get("kind").and_then(Value::as_str) == Some(APPLICATION_KIND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_marker_matches_yaml_names() {
        assert!(is_document_file("apps.yaml"));
        assert!(is_document_file("manifest.yaml"));
        assert!(is_document_file("apps.yaml.bak"));
        assert!(!is_document_file("hash.sum"));
        assert!(!is_document_file("apps.yml"));
    }

    #[test]
    fn definition_keeps_unmodelled_fields() {
        let doc = "kind: Application\nmetadata: {name: a}\nspec:\n  syncPolicy: {automated: {}}\n";
        let nodes = parse_str(doc, Path::new("inline.yaml")).expect("parse");
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].definition["spec"].get("syncPolicy").is_some());
    }

    #[test]
    fn empty_input_yields_no_nodes() {
        let nodes = parse_str("", Path::new("empty.yaml")).expect("parse");
        assert!(nodes.is_empty());
    }
}
