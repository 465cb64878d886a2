//! `helm template` renderer.
//!
//! The chart is rendered from inside its own directory as `../<chart>`, so
//! value file references in documents are relative to the chart directory.
//! Stdout becomes `<output>/manifest.yaml`.
//!
//! A chart whose dependencies have not been vendored fails with one of the
//! [`MISSING_DEPENDENCY_PATTERNS`]; in that case `helm dependency update` is
//! run once and the template is retried exactly once.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::NamedTempFile;

use manifold_core::{is_ignored_value_file, ApplicationNode};

use crate::dispatch::NodeRenderer;
use crate::error::{io_err, RenderError};

/// File name of the rendered manifest inside a node's output directory.
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Value forced onto the skip-render key so charts can opt sub-trees out.
pub const SKIP_RENDER_VALUE: &str = "CONSCIOUSLY_NOT_RENDERED";

/// Stderr fragments that mean "run `helm dependency update` and retry".
pub const MISSING_DEPENDENCY_PATTERNS: &[&str] = &[
    "found in requirements.yaml, but missing in charts",
    "found in Chart.yaml, but missing in charts/ directory",
];

/// Whether helm's stderr reports unvendored chart dependencies.
pub fn is_missing_dependency(stderr: &str) -> bool {
    MISSING_DEPENDENCY_PATTERNS
        .iter()
        .any(|pattern| stderr.contains(pattern))
}

/// Renders `helm` sourced nodes by shelling out to the helm binary.
#[derive(Debug, Clone)]
pub struct HelmTemplate {
    workdir: PathBuf,
    program: String,
    skip_render_key: Option<String>,
    ignore_value_file: Option<String>,
}

impl HelmTemplate {
    /// Node source paths are resolved against `workdir`.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        HelmTemplate {
            workdir: workdir.into(),
            program: "helm".to_string(),
            skip_render_key: None,
            ignore_value_file: None,
        }
    }

    /// Use a different helm executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Force `<key>=CONSCIOUSLY_NOT_RENDERED` on every render. Empty disables.
    pub fn with_skip_render_key(mut self, key: impl Into<String>) -> Self {
        self.skip_render_key = Some(key.into()).filter(|k| !k.is_empty());
        self
    }

    /// Drop value files whose path contains `pattern`. Empty disables.
    pub fn with_ignore_value_file(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_value_file = Some(pattern.into()).filter(|p| !p.is_empty());
        self
    }

    fn chart_dir(&self, node: &ApplicationNode) -> PathBuf {
        self.workdir.join(node.source_path())
    }

    /// Flatten parameters and value files into helm's comma-joined form.
    ///
    /// Returns `(set_values, file_values)`. A value file is dropped when it
    /// matches the ignore pattern, or when it does not exist (relative to the
    /// chart directory) and the node sets `ignoreMissingValueFiles`.
    pub fn build_params(&self, node: &ApplicationNode) -> (String, String) {
        let set_values = node
            .parameters()
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect::<Vec<_>>()
            .join(",");

        let chart_dir = self.chart_dir(node);
        let file_values = node
            .value_files()
            .iter()
            .filter(|file| !is_ignored_value_file(file, self.ignore_value_file.as_deref()))
            .filter(|file| {
                !(node.ignore_missing_value_files() && !chart_dir.join(file.as_str()).exists())
            })
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");

        (set_values, file_values)
    }

    fn command(&self, node: &ApplicationNode, values_file: Option<&Path>) -> Command {
        let chart_dir = self.chart_dir(node);
        let chart = node
            .source_path()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        let (set_values, file_values) = self.build_params(node);

        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&chart_dir)
            .arg("template")
            .arg(format!("../{chart}"));
        if !set_values.is_empty() {
            cmd.arg("--set").arg(set_values);
        }
        if !file_values.is_empty() {
            cmd.arg("-f").arg(file_values);
        }
        if let Some(values) = values_file {
            cmd.arg("-f").arg(values);
        }
        if !node.namespace().is_empty() {
            cmd.arg("-n").arg(node.namespace());
        }
        if let Some(key) = &self.skip_render_key {
            cmd.arg("--set").arg(format!("{key}={SKIP_RENDER_VALUE}"));
        }
        cmd
    }

    fn run(&self, cmd: &mut Command) -> Result<Output, RenderError> {
        cmd.output().map_err(|e| RenderError::Spawn {
            program: self.program.clone(),
            source: e,
        })
    }

    fn update_dependencies(&self, chart_dir: &Path) -> Result<(), RenderError> {
        tracing::info!(chart = %chart_dir.display(), "updating chart dependencies");
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(chart_dir).args(["dependency", "update"]);
        let out = self.run(&mut cmd)?;
        if !out.status.success() {
            return Err(RenderError::DependencyUpdate {
                chart: chart_dir.to_path_buf(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        Ok(())
    }

    /// Run `helm template` for `node` and return the manifest bytes.
    pub fn template(&self, node: &ApplicationNode) -> Result<Vec<u8>, RenderError> {
        // Held until the command has finished; deleted on drop.
        let values_file = node.inline_values().map(write_values_file).transpose()?;
        let values_path = values_file.as_ref().map(NamedTempFile::path);

        let mut dependencies_updated = false;
        loop {
            let out = self.run(&mut self.command(node, values_path))?;
            if out.status.success() {
                return Ok(out.stdout);
            }

            let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
            if !dependencies_updated && is_missing_dependency(&stderr) {
                self.update_dependencies(&self.chart_dir(node))?;
                dependencies_updated = true;
                continue;
            }

            return Err(RenderError::Template {
                name: node.name().to_string(),
                status: out.status.to_string(),
                stderr,
            });
        }
    }
}

impl NodeRenderer for HelmTemplate {
    fn render(&self, node: &ApplicationNode, output: &Path) -> Result<(), RenderError> {
        let manifest = self.template(node)?;
        write_manifest(&manifest, output)
    }
}

fn write_values_file(values: &str) -> Result<NamedTempFile, RenderError> {
    let tmp_dir = std::env::temp_dir();
    let mut file = tempfile::Builder::new()
        .prefix("temp.")
        .suffix(".yaml")
        .tempfile()
        .map_err(|e| io_err(&tmp_dir, e))?;
    file.write_all(values.as_bytes())
        .map_err(|e| io_err(file.path(), e))?;
    Ok(file)
}

/// Write `manifest` to `<output>/manifest.yaml`, creating `output`.
pub fn write_manifest(manifest: &[u8], output: &Path) -> Result<(), RenderError> {
    std::fs::create_dir_all(output).map_err(|e| io_err(output, e))?;
    let path = output.join(MANIFEST_FILE);
    std::fs::write(&path, manifest).map_err(|e| io_err(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use manifold_core::document;
    use rstest::rstest;
    use tempfile::TempDir;

    fn node(doc: &str) -> ApplicationNode {
        document::parse_str(doc, Path::new("test.yaml"))
            .expect("parse")
            .remove(0)
    }

    const ONE_PARAM: &str = r#"
kind: Application
metadata: {name: prod-cluster}
spec:
  source:
    path: charts/app-of-apps
    helm:
      parameters:
        - {name: region, value: us-east-1}
      valueFiles:
        - ../../overrides/bootstrap/prod-cluster.yaml
"#;

    const TWO_PARAMS: &str = r#"
kind: Application
metadata: {name: prod-cluster}
spec:
  source:
    path: charts/app-of-apps
    helm:
      parameters:
        - {name: region, value: us-east-1}
        - {name: testName, value: testValue}
      valueFiles:
        - ../../overrides/bootstrap/prod-cluster.yaml
        - ../../overrides/bootstrap/fake_file.yaml
"#;

    const IGNORABLE: &str = r#"
kind: Application
metadata: {name: bar}
spec:
  source:
    path: charts/bar
    helm:
      ignoreMissingValueFiles: true
      parameters:
        - {name: env, value: test}
      valueFiles:
        - ../../overrides/service/bar/base.yaml
        - ../../overrides/service/bar/test.yaml
"#;

    #[test]
    fn build_params_single_parameter() {
        let helm = HelmTemplate::new("/nonexistent");
        let (set, files) = helm.build_params(&node(ONE_PARAM));
        assert_eq!(set, "region=us-east-1");
        assert_eq!(files, "../../overrides/bootstrap/prod-cluster.yaml");
    }

    #[test]
    fn build_params_joins_with_commas() {
        let helm = HelmTemplate::new("/nonexistent");
        let (set, files) = helm.build_params(&node(TWO_PARAMS));
        assert_eq!(set, "region=us-east-1,testName=testValue");
        assert_eq!(
            files,
            "../../overrides/bootstrap/prod-cluster.yaml,../../overrides/bootstrap/fake_file.yaml"
        );
    }

    #[test]
    fn build_params_drops_ignored_value_file() {
        let tmp = TempDir::new().unwrap();
        let helm = HelmTemplate::new(tmp.path()).with_ignore_value_file("overrides/service/bar/test.yaml");
        let mut app = node(IGNORABLE);
        app.spec.source.helm.as_mut().unwrap().ignore_missing_value_files = false;
        let (set, files) = helm.build_params(&app);
        assert_eq!(set, "env=test");
        assert_eq!(files, "../../overrides/service/bar/base.yaml");
    }

    #[test]
    fn build_params_keeps_present_files_when_ignoring_missing() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("charts/bar")).unwrap();
        let overrides = tmp.path().join("overrides/service/bar");
        fs::create_dir_all(&overrides).unwrap();
        fs::write(overrides.join("base.yaml"), "a: 1\n").unwrap();

        let helm = HelmTemplate::new(tmp.path().join("work/nested"));
        // The chart dir does not exist, so neither reference resolves.
        let (_, files) = helm.build_params(&node(IGNORABLE));
        assert_eq!(files, "");

        let helm = HelmTemplate::new(tmp.path());
        let (_, files) = helm.build_params(&node(IGNORABLE));
        assert_eq!(files, "../../overrides/service/bar/base.yaml");
    }

    #[test]
    fn empty_patterns_disable_features() {
        let helm = HelmTemplate::new("/w").with_skip_render_key("").with_ignore_value_file("");
        assert!(helm.skip_render_key.is_none());
        assert!(helm.ignore_value_file.is_none());
    }

    #[rstest]
    #[case("Error: found in Chart.yaml, but missing in charts/ directory: postgresql", true)]
    #[case("Error: found in requirements.yaml, but missing in charts", true)]
    #[case("no such file or directory", false)]
    fn missing_dependency_detection(#[case] stderr: &str, #[case] expected: bool) {
        assert_eq!(is_missing_dependency(stderr), expected);
    }

    #[test]
    fn values_file_holds_inline_payload() {
        let content = "\napiVersion: argoproj.io/v1alpha1\nkind: Application\n";
        let file = write_values_file(content).expect("temp file");
        let path = file.path().to_path_buf();
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("temp.") && name.ends_with(".yaml"));
        drop(file);
        assert!(!path.exists(), "temp values file should be removed on drop");
    }

    #[test]
    fn write_manifest_creates_output_dir() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("a/b");
        write_manifest(b"kind: List\n", &out).unwrap();
        assert_eq!(fs::read_to_string(out.join(MANIFEST_FILE)).unwrap(), "kind: List\n");
    }
}
