//! Run entrypoint shared by the CLI and tests.

use std::path::PathBuf;
use std::time::Instant;

use manifold_renderer::{CopySource, Dispatcher, HelmTemplate, PostRenderHook};

use crate::hash_store::{open_store, HashStoreKind, HashStrategy};
use crate::hasher::ContentHasher;
use crate::walker::{
    ensure_output_dir, WalkReport, Walker, WalkerConfig, DEFAULT_CONCURRENCY,
    DEFAULT_IGNORE_SUFFIX,
};
use crate::SyncError;

pub const DEFAULT_ROOT: &str = "bootstrap";
pub const DEFAULT_OUTPUT: &str = ".zz.auto-generated";
pub const DEFAULT_SKIP_RENDER_KEY: &str = "do-not-render";
pub const DEFAULT_IGNORE_VALUE_FILE: &str = "overrides-to-ignore";
pub const DEFAULT_HELM_BIN: &str = "helm";

/// Everything one run needs.
///
/// Relative `root` and `output` resolve against `workdir`, as do node source
/// paths and value files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub workdir: PathBuf,
    pub root: PathBuf,
    pub output: PathBuf,
    /// `None` walks without bound and prunes afterwards.
    pub max_depth: Option<usize>,
    pub hash_store: HashStoreKind,
    pub hash_strategy: HashStrategy,
    pub ignore_suffix: String,
    pub skip_render_key: String,
    pub ignore_value_file: String,
    pub post_renderer: Option<PathBuf>,
    pub helm_bin: String,
    pub concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            workdir: PathBuf::from("."),
            root: PathBuf::from(DEFAULT_ROOT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            max_depth: None,
            hash_store: HashStoreKind::default(),
            hash_strategy: HashStrategy::default(),
            ignore_suffix: DEFAULT_IGNORE_SUFFIX.to_string(),
            skip_render_key: DEFAULT_SKIP_RENDER_KEY.to_string(),
            ignore_value_file: DEFAULT_IGNORE_VALUE_FILE.to_string(),
            post_renderer: None,
            helm_bin: DEFAULT_HELM_BIN.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl RunConfig {
    pub fn input_dir(&self) -> PathBuf {
        self.workdir.join(&self.root)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.workdir.join(&self.output)
    }

    /// Walker wired to helm, raw copy, and the optional post-render hook.
    pub fn walker(&self) -> Walker {
        let template = HelmTemplate::new(&self.workdir)
            .with_program(self.helm_bin.clone())
            .with_skip_render_key(self.skip_render_key.clone())
            .with_ignore_value_file(self.ignore_value_file.clone());
        let mut dispatcher = Dispatcher::new(
            Box::new(template),
            Box::new(CopySource::new(&self.workdir)),
        );
        if let Some(hook) = self.post_render_command() {
            dispatcher = dispatcher
                .with_post_render(PostRenderHook::new(hook).with_workdir(&self.workdir));
        }

        let hasher =
            ContentHasher::new(&self.workdir).with_ignore_value_file(self.ignore_value_file.clone());
        Walker::new(dispatcher, hasher, self.walker_config())
    }

    /// The post-render command as it will be spawned. A relative path with a
    /// directory part resolves against `workdir` and is made absolute; a bare
    /// name is left for `PATH` lookup.
    pub fn post_render_command(&self) -> Option<PathBuf> {
        let hook = self.post_renderer.as_deref()?;
        if hook.is_absolute() || hook.components().count() < 2 {
            return Some(hook.to_path_buf());
        }
        let joined = self.workdir.join(hook);
        if joined.is_absolute() {
            return Some(joined);
        }
        Some(match std::env::current_dir() {
            Ok(cwd) => cwd.join(joined),
            Err(_) => joined,
        })
    }

    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            ignore_suffix: self.ignore_suffix.clone(),
            concurrency: self.concurrency,
        }
    }
}

/// Run with the walker built from `config`.
pub async fn run(config: &RunConfig) -> Result<WalkReport, SyncError> {
    run_with(&config.walker(), config).await
}

/// Run with a caller-supplied walker.
pub async fn run_with(walker: &Walker, config: &RunConfig) -> Result<WalkReport, SyncError> {
    let started = Instant::now();
    let input = config.input_dir();
    let output = config.output_dir();

    ensure_output_dir(&output)?;
    let store = open_store(config.hash_store, config.hash_strategy, &output)?;
    let report = walker.walk(&input, &output, config.max_depth, store).await?;

    tracing::info!(
        rendered = report.rendered(),
        unchanged = report.unchanged(),
        unsupported = report.unsupported(),
        pruned = report.pruned.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_workdir() {
        let config = RunConfig {
            workdir: PathBuf::from("/repo"),
            ..RunConfig::default()
        };
        assert_eq!(config.input_dir(), PathBuf::from("/repo/bootstrap"));
        assert_eq!(config.output_dir(), PathBuf::from("/repo/.zz.auto-generated"));
    }

    #[test]
    fn absolute_output_is_kept() {
        let config = RunConfig {
            workdir: PathBuf::from("/repo"),
            output: PathBuf::from("/tmp/rendered"),
            ..RunConfig::default()
        };
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/rendered"));
    }

    #[test]
    fn relative_hook_resolves_against_workdir() {
        let config = RunConfig {
            workdir: PathBuf::from("/repo"),
            post_renderer: Some(PathBuf::from("./hack/post.sh")),
            ..RunConfig::default()
        };
        assert_eq!(
            config.post_render_command(),
            Some(PathBuf::from("/repo/./hack/post.sh"))
        );
    }

    #[test]
    fn bare_and_absolute_hooks_are_kept() {
        let bare = RunConfig {
            post_renderer: Some(PathBuf::from("kubeconform")),
            ..RunConfig::default()
        };
        assert_eq!(bare.post_render_command(), Some(PathBuf::from("kubeconform")));

        let absolute = RunConfig {
            workdir: PathBuf::from("/repo"),
            post_renderer: Some(PathBuf::from("/usr/local/bin/post")),
            ..RunConfig::default()
        };
        assert_eq!(
            absolute.post_render_command(),
            Some(PathBuf::from("/usr/local/bin/post"))
        );
        assert_eq!(RunConfig::default().post_render_command(), None);
    }

    #[test]
    fn defaults_match_documented_flags() {
        let config = RunConfig::default();
        assert_eq!(config.max_depth, None);
        assert_eq!(config.hash_store, HashStoreKind::SumFile);
        assert_eq!(config.hash_strategy, HashStrategy::ReadWrite);
        assert_eq!(config.walker_config().concurrency, 10);
        assert_eq!(config.walker_config().ignore_suffix, "-ignore");
    }
}
