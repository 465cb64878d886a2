//! Domain types for application definitions.
//!
//! An [`ApplicationNode`] mirrors the subset of an Argo CD `Application`
//! document that drives rendering. Every field defaults when absent so that
//! sparse documents still parse; the raw document is kept alongside the typed
//! view for fingerprinting.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The `kind` value that marks a document as an application definition.
pub const APPLICATION_KIND: &str = "Application";

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a node's output is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Rendered through the external templating renderer (`helm` block).
    Template,
    /// Source directory copied verbatim.
    RawCopy,
    /// Declares a templating system that is deliberately not implemented
    /// (`kustomize` block). Skipped, never failed.
    Unsupported,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Template => write!(f, "template"),
            SourceKind::RawCopy => write!(f, "raw-copy"),
            SourceKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

// ---------------------------------------------------------------------------
// Document structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A single `--set` style parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HelmParameter {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct HelmSource {
    pub parameters: Vec<HelmParameter>,
    /// Value files, relative to the chart directory.
    pub value_files: Vec<String>,
    /// Inline values payload.
    pub values: String,
    pub ignore_missing_value_files: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplicationSource {
    #[serde(rename = "repoURL", skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helm: Option<HelmSource>,
    /// Only its presence matters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kustomize: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Destination {
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplicationSpec {
    pub source: ApplicationSource,
    pub destination: Destination,
}

/// One application definition discovered while walking.
///
/// Nodes are transient: parsed fresh on every run and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplicationNode {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ApplicationSpec,
    /// The document exactly as read, including fields the typed view drops.
    #[serde(skip)]
    pub definition: serde_yaml::Value,
}

impl ApplicationNode {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Source directory, relative to the working directory.
    pub fn source_path(&self) -> &str {
        &self.spec.source.path
    }

    /// Target namespace passed to the renderer.
    pub fn namespace(&self) -> &str {
        &self.spec.destination.namespace
    }

    pub fn parameters(&self) -> &[HelmParameter] {
        self.spec
            .source
            .helm
            .as_ref()
            .map(|h| h.parameters.as_slice())
            .unwrap_or_default()
    }

    pub fn value_files(&self) -> &[String] {
        self.spec
            .source
            .helm
            .as_ref()
            .map(|h| h.value_files.as_slice())
            .unwrap_or_default()
    }

    pub fn inline_values(&self) -> Option<&str> {
        self.spec
            .source
            .helm
            .as_ref()
            .map(|h| h.values.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn ignore_missing_value_files(&self) -> bool {
        self.spec
            .source
            .helm
            .as_ref()
            .is_some_and(|h| h.ignore_missing_value_files)
    }

    /// Which render path applies. Any `kustomize` block makes the node
    /// unsupported, even alongside `helm`.
    pub fn source_kind(&self) -> SourceKind {
        if self.spec.source.kustomize.is_some() {
            SourceKind::Unsupported
        } else if self.spec.source.helm.is_some() {
            SourceKind::Template
        } else {
            SourceKind::RawCopy
        }
    }
}

/// Returns true when a value file should be left out of both the render
/// invocation and the fingerprint.
///
/// `pattern` is a substring; an empty pattern ignores nothing.
pub fn is_ignored_value_file(file: &str, pattern: Option<&str>) -> bool {
    pattern.is_some_and(|pat| !pat.is_empty() && file.contains(pat))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
