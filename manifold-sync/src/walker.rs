//! Depth-first, concurrent walk over document directories.
//!
//! The walk starts at the root input directory. Every document file found
//! there is read on its own task; each application node in it is fingerprinted,
//! re-rendered when its digest moved, and then its output directory is walked
//! one level deeper. All node outputs land flat under the same output root.
//!
//! Concurrency is gated per directory level: at most `concurrency` document
//! files of one directory are in flight, and a task keeps its permit while it
//! descends. Every task of a level is joined before the level returns, and
//! every failure of the level is reported.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::{spawn_blocking, JoinSet};

use manifold_core::{document, ApplicationNode};
use manifold_renderer::{Dispatcher, RenderOutcome, MANIFEST_FILE};

use crate::error::{io_err, SyncError};
use crate::hash_store::{validate_node_name, HashStore};
use crate::hasher::{ContentHasher, Fingerprint};
use crate::prune::{prune_unvisited, VisitedSet};

/// Document files of one directory processed at the same time.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Nodes whose name ends with this are skipped by default.
pub const DEFAULT_IGNORE_SUFFIX: &str = "-ignore";

type WalkFuture = Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send + 'static>>;

// ---------------------------------------------------------------------------
// 1. Configuration and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Nodes whose name ends with this suffix are neither rendered nor kept.
    /// Empty disables the check.
    pub ignore_suffix: String,
    /// Per-level bound on in-flight document files.
    pub concurrency: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        WalkerConfig {
            ignore_suffix: DEFAULT_IGNORE_SUFFIX.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// What happened to one node during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeResult {
    Rendered { name: String, output: PathBuf },
    Unchanged { name: String, output: PathBuf },
    Unsupported { name: String, output: PathBuf },
}

impl NodeResult {
    pub fn name(&self) -> &str {
        match self {
            NodeResult::Rendered { name, .. }
            | NodeResult::Unchanged { name, .. }
            | NodeResult::Unsupported { name, .. } => name,
        }
    }

    pub fn output(&self) -> &Path {
        match self {
            NodeResult::Rendered { output, .. }
            | NodeResult::Unchanged { output, .. }
            | NodeResult::Unsupported { output, .. } => output,
        }
    }
}

/// Outcome of a successful walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Every node reached, sorted by output path.
    pub nodes: Vec<NodeResult>,
    /// Output directories removed because no node claimed them.
    pub pruned: Vec<PathBuf>,
}

impl WalkReport {
    pub fn rendered(&self) -> usize {
        self.count(|n| matches!(n, NodeResult::Rendered { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|n| matches!(n, NodeResult::Unchanged { .. }))
    }

    pub fn unsupported(&self) -> usize {
        self.count(|n| matches!(n, NodeResult::Unsupported { .. }))
    }

    /// Look up a node's result by name.
    pub fn node(&self, name: &str) -> Option<&NodeResult> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    fn count(&self, pred: impl Fn(&NodeResult) -> bool) -> usize {
        self.nodes.iter().filter(|n| pred(n)).count()
    }
}

// ---------------------------------------------------------------------------
// 2. Walker
// ---------------------------------------------------------------------------

/// Walks a document tree, rendering stale nodes.
#[derive(Clone)]
pub struct Walker {
    dispatcher: Arc<Dispatcher>,
    hasher: Arc<ContentHasher>,
    config: Arc<WalkerConfig>,
}

/// State shared by every task of one walk.
struct WalkState {
    output: PathBuf,
    max_depth: Option<usize>,
    store: Arc<dyn HashStore>,
    visited: VisitedSet,
    results: Mutex<Vec<NodeResult>>,
}

impl WalkState {
    fn record(&self, result: NodeResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result);
    }
}

impl Walker {
    pub fn new(dispatcher: Dispatcher, hasher: ContentHasher, config: WalkerConfig) -> Self {
        Walker {
            dispatcher: Arc::new(dispatcher),
            hasher: Arc::new(hasher),
            config: Arc::new(config),
        }
    }

    /// Walk from `input`, writing node outputs under `output`.
    ///
    /// `max_depth` of `None` walks without bound and then prunes output
    /// directories no node claimed. A bounded walk never prunes. The store is
    /// saved only when the whole walk succeeded.
    pub async fn walk(
        &self,
        input: &Path,
        output: &Path,
        max_depth: Option<usize>,
        store: Arc<dyn HashStore>,
    ) -> Result<WalkReport, SyncError> {
        let state = Arc::new(WalkState {
            output: output.to_path_buf(),
            max_depth,
            store,
            visited: VisitedSet::new(),
            results: Mutex::new(Vec::new()),
        });

        self.clone()
            .walk_dir(input.to_path_buf(), 0, state.clone())
            .await?;

        let store = state.store.clone();
        spawn_blocking(move || store.save()).await??;

        let pruned = if max_depth.is_none() {
            let st = state.clone();
            spawn_blocking(move || prune_unvisited(&st.visited, &st.output)).await??
        } else {
            Vec::new()
        };

        let mut nodes = std::mem::take(
            &mut *state.results.lock().unwrap_or_else(PoisonError::into_inner),
        );
        nodes.sort_by(|a, b| a.output().cmp(b.output()));
        Ok(WalkReport { nodes, pruned })
    }

    fn walk_dir(self, dir: PathBuf, depth: usize, state: Arc<WalkState>) -> WalkFuture {
        Box::pin(async move {
            if state.max_depth.is_some_and(|max| depth > max) {
                return Ok(());
            }
            tracing::info!(dir = %dir.display(), depth, "dropping into");

            let listing = dir.clone();
            let files = spawn_blocking(move || document_files(&listing)).await??;

            let gate = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
            let mut tasks = JoinSet::new();
            for file in files {
                let permit = gate
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| SyncError::GateClosed)?;
                let walker = self.clone();
                let state = state.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    walker.visit_document(file, depth, state).await
                });
            }

            let mut failures = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => failures.push(err),
                    Err(err) => failures.push(SyncError::Join(err)),
                }
            }
            SyncError::collect(failures)
        })
    }

    /// Process the nodes of one document file in declaration order. The
    /// first failing node ends the file.
    async fn visit_document(
        self,
        file: PathBuf,
        depth: usize,
        state: Arc<WalkState>,
    ) -> Result<(), SyncError> {
        let path = file.clone();
        let nodes = spawn_blocking(move || document::read(&path)).await??;

        for node in nodes {
            if self.is_ignored(&node) {
                tracing::debug!(node = node.name(), "ignored by suffix");
                continue;
            }
            self.clone().visit_node(node, depth, state.clone()).await?;
        }
        Ok(())
    }

    async fn visit_node(
        self,
        node: ApplicationNode,
        depth: usize,
        state: Arc<WalkState>,
    ) -> Result<(), SyncError> {
        let name = node.name().to_string();
        validate_node_name(&name)?;
        let output = state.output.join(&name);
        if !state.visited.insert(output.clone()) {
            tracing::warn!(node = %name, "node declared more than once");
        }

        let node = Arc::new(node);
        let (previous, fingerprint) = {
            let store = state.store.clone();
            let hasher = self.hasher.clone();
            let node = node.clone();
            let key = name.clone();
            spawn_blocking(move || -> Result<_, SyncError> {
                Ok((store.get(&key)?, hasher.fingerprint(&node)?))
            })
            .await??
        };

        let digest = match fingerprint {
            Fingerprint::Computed(digest) => digest,
            Fingerprint::Unsupported => {
                tracing::warn!(node = %name, "source kind not supported; skipping");
                return self.finish_unsupported(name, output, depth, state).await;
            }
        };

        let stale = {
            let output = output.clone();
            let digest = digest.clone();
            spawn_blocking(move || needs_render(&previous, &digest, &output)).await??
        };

        if !stale {
            tracing::debug!(node = %name, "digest unchanged");
            state.record(NodeResult::Unchanged {
                name,
                output: output.clone(),
            });
            return self.walk_dir(output, depth + 1, state).await;
        }

        tracing::info!(node = %name, "no match detected, rendering");
        let outcome = {
            let dispatcher = self.dispatcher.clone();
            let node = node.clone();
            let output = output.clone();
            spawn_blocking(move || dispatcher.render(&node, &output)).await??
        };
        if outcome == RenderOutcome::Unsupported {
            return self.finish_unsupported(name, output, depth, state).await;
        }

        {
            let store = state.store.clone();
            let key = name.clone();
            spawn_blocking(move || store.add(&key, &digest)).await??;
        }
        state.record(NodeResult::Rendered {
            name,
            output: output.clone(),
        });
        self.walk_dir(output, depth + 1, state).await
    }

    /// Unsupported nodes are never rendered, but output left from an earlier
    /// run is still walked so its children stay claimed.
    async fn finish_unsupported(
        self,
        name: String,
        output: PathBuf,
        depth: usize,
        state: Arc<WalkState>,
    ) -> Result<(), SyncError> {
        state.record(NodeResult::Unsupported {
            name,
            output: output.clone(),
        });
        if output.is_dir() {
            return self.walk_dir(output, depth + 1, state).await;
        }
        Ok(())
    }

    fn is_ignored(&self, node: &ApplicationNode) -> bool {
        let suffix = &self.config.ignore_suffix;
        !suffix.is_empty() && node.name().ends_with(suffix.as_str())
    }
}

// ---------------------------------------------------------------------------
// 3. Filesystem helpers
// ---------------------------------------------------------------------------

/// Create the output root if it does not exist.
pub fn ensure_output_dir(output: &Path) -> Result<(), SyncError> {
    std::fs::create_dir_all(output).map_err(|e| io_err(output, e))
}

/// A manifest that exists with zero bytes. A missing manifest is not empty.
pub fn empty_manifest(path: &Path) -> Result<bool, SyncError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len() == 0),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

fn needs_render(previous: &str, digest: &str, output: &Path) -> Result<bool, SyncError> {
    if previous != digest {
        return Ok(true);
    }
    if !output.is_dir() {
        return Ok(true);
    }
    empty_manifest(&output.join(MANIFEST_FILE))
}

/// Document files directly inside `dir`, sorted by name. Directories, and
/// symlinks to directories, are skipped even when their name matches.
fn document_files(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        if !document::is_document_file(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let meta = std::fs::metadata(&path).map_err(|e| io_err(&path, e))?;
        if !meta.is_dir() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_manifest_distinguishes_missing_and_zero_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILE);
        assert!(!empty_manifest(&path).unwrap());
        fs::write(&path, "").unwrap();
        assert!(empty_manifest(&path).unwrap());
        fs::write(&path, "kind: List\n").unwrap();
        assert!(!empty_manifest(&path).unwrap());
    }

    #[test]
    fn needs_render_when_digest_moves_or_output_is_gone() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("foo");
        assert!(needs_render("", "abc", &out).unwrap());
        assert!(needs_render("abc", "abc", &out).unwrap());

        fs::create_dir_all(&out).unwrap();
        fs::write(out.join(MANIFEST_FILE), "kind: List\n").unwrap();
        assert!(!needs_render("abc", "abc", &out).unwrap());
        assert!(needs_render("old", "abc", &out).unwrap());
    }

    #[test]
    fn document_files_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        for name in ["b.yaml", "a.yaml", "hash.sum", "notes.txt"] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        fs::create_dir(tmp.path().join("dir.yaml.d")).unwrap();
        let files = document_files(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.yaml", "b.yaml"]);
    }

    #[cfg(unix)]
    #[test]
    fn document_files_skips_symlinked_directories() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("apps.yaml"), "").unwrap();
        fs::create_dir(tmp.path().join("real")).unwrap();
        std::os::unix::fs::symlink("real", tmp.path().join("linked.yaml")).unwrap();

        let files = document_files(tmp.path()).unwrap();
        assert_eq!(files, [tmp.path().join("apps.yaml")]);
    }

    #[test]
    fn report_counts_by_outcome() {
        let report = WalkReport {
            nodes: vec![
                NodeResult::Rendered { name: "a".into(), output: "o/a".into() },
                NodeResult::Unchanged { name: "b".into(), output: "o/b".into() },
                NodeResult::Unchanged { name: "c".into(), output: "o/c".into() },
            ],
            pruned: vec![],
        };
        assert_eq!(report.rendered(), 1);
        assert_eq!(report.unchanged(), 2);
        assert_eq!(report.unsupported(), 0);
        assert_eq!(report.node("c").map(NodeResult::output), Some(Path::new("o/c")));
    }
}
