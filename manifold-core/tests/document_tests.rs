//! Document reader integration tests: multi-document files, kind filtering,
//! JSON input, and error messages.

use assert_fs::prelude::*;
use manifold_core::{document, DocumentError, SourceKind};
use rstest::rstest;

const TWO_APPS: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: prod-cluster
  namespace: argocd
spec:
  source:
    path: charts/app-of-apps
    helm:
      parameters:
        - name: region
          value: us-east-1
      valueFiles:
        - ../../overrides/bootstrap/prod-cluster.yaml
  destination:
    namespace: argocd
---
# Source: app-of-apps/templates/apps.yaml
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: service-foo
spec:
  source:
    path: manifests/foo
  destination:
    namespace: foo
"#;

const MIXED_KINDS: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: not-an-app
data:
  key: value
---
---
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: only-app
spec:
  source:
    path: charts/only
    kustomize:
      namePrefix: x-
"#;

// ---------------------------------------------------------------------------
// 1. Reading
// ---------------------------------------------------------------------------

#[test]
fn reads_every_application_in_a_multi_document_file() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("apps.yaml");
    file.write_str(TWO_APPS).expect("write");

    let nodes = document::read(file.path()).expect("read");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].name(), "prod-cluster");
    assert_eq!(
        nodes[0].value_files(),
        ["../../overrides/bootstrap/prod-cluster.yaml"]
    );
    assert_eq!(nodes[1].name(), "service-foo");
    assert_eq!(nodes[1].source_kind(), SourceKind::RawCopy);
}

#[test]
fn other_kinds_and_empty_documents_are_ignored() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("mixed.yaml");
    file.write_str(MIXED_KINDS).expect("write");

    let nodes = document::read(file.path()).expect("read");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name(), "only-app");
    assert_eq!(nodes[0].source_kind(), SourceKind::Unsupported);
}

#[test]
fn json_documents_are_accepted() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("app.json.yaml");
    file.write_str(
        r#"{"kind":"Application","metadata":{"name":"json-app"},"spec":{"source":{"path":"charts/j","helm":{"values":"replicas: 2"}}}}"#,
    )
    .expect("write");

    let nodes = document::read(file.path()).expect("read");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].inline_values(), Some("replicas: 2"));
    assert_eq!(nodes[0].source_kind(), SourceKind::Template);
}

#[rstest]
#[case(&["region"])]
#[case(&["region", "testName"])]
#[case(&["zeta", "alpha", "mid"])]
fn parameters_keep_declaration_order(#[case] names: &[&str]) {
    let params: String = names
        .iter()
        .map(|n| format!("        - name: {n}\n          value: v\n"))
        .collect();
    let doc = format!(
        "kind: Application\nmetadata:\n  name: p\nspec:\n  source:\n    path: charts/p\n    helm:\n      parameters:\n{params}"
    );
    let nodes = document::parse_str(&doc, std::path::Path::new("p.yaml")).expect("parse");
    let got: Vec<&str> = nodes[0].parameters().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(got, names);
}

// ---------------------------------------------------------------------------
// 2. Errors
// ---------------------------------------------------------------------------

#[test]
fn missing_file_returns_io_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = document::read(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, DocumentError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("nope.yaml"));
}

#[test]
fn malformed_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("broken.yaml");
    file.write_str("kind: Application\nmetadata: [unclosed\n").expect("write");

    let err = document::read(file.path()).unwrap_err();
    assert!(matches!(err, DocumentError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("broken.yaml"));
    file.assert(predicates::str::contains("unclosed"));
}

#[test]
fn application_with_wrong_field_type_is_a_parse_error() {
    let err = document::parse_str(
        "kind: Application\nmetadata:\n  name: [not, a, string]\n",
        std::path::Path::new("typed.yaml"),
    )
    .unwrap_err();
    assert!(matches!(err, DocumentError::Parse { .. }), "got: {err}");
}
