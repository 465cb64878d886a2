//! The render run: flags, pipeline invocation, and the printed summary.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use manifold_sync::pipeline::{
    self, RunConfig, DEFAULT_HELM_BIN, DEFAULT_IGNORE_VALUE_FILE, DEFAULT_OUTPUT, DEFAULT_ROOT,
    DEFAULT_SKIP_RENDER_KEY,
};
use manifold_sync::walker::{DEFAULT_CONCURRENCY, DEFAULT_IGNORE_SUFFIX};
use manifold_sync::{HashStoreKind, HashStrategy, NodeResult, WalkReport};

/// `--max-depth` value meaning "no bound".
const INFINITE_DEPTH: i64 = -1;

/// Arguments for a render run.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Directory holding the root document files.
    #[arg(long, default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Directory that node source paths, --root and --output resolve against.
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// Directory receiving one subdirectory per node.
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Maximum walk depth; -1 walks everything and prunes stale outputs.
    #[arg(long, default_value_t = INFINITE_DEPTH, allow_negative_numbers = true)]
    pub max_depth: i64,

    /// Where digests are kept: sumfile or json.
    #[arg(long, default_value_t = HashStoreKind::SumFile)]
    pub hash_store: HashStoreKind,

    /// readwrite records new digests; read only compares.
    #[arg(long, default_value_t = HashStrategy::ReadWrite)]
    pub hash_strategy: HashStrategy,

    /// Nodes whose name ends with this are skipped. Empty disables.
    #[arg(long, default_value = DEFAULT_IGNORE_SUFFIX, allow_hyphen_values = true)]
    pub ignore_suffix: String,

    /// Key forced to CONSCIOUSLY_NOT_RENDERED on every template render. Empty disables.
    #[arg(long, default_value = DEFAULT_SKIP_RENDER_KEY)]
    pub skip_render_key: String,

    /// Value files whose path contains this are neither hashed nor passed on. Empty disables.
    #[arg(long, default_value = DEFAULT_IGNORE_VALUE_FILE)]
    pub ignore_value_file: String,

    /// Command run with each freshly rendered output directory.
    #[arg(long)]
    pub post_renderer: Option<PathBuf>,

    /// Document files of one directory processed at once.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Template renderer executable.
    #[arg(long, default_value = DEFAULT_HELM_BIN)]
    pub helm_bin: String,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let config = self.into_config()?;
        tracing::debug!(?config, "resolved configuration");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("could not start async runtime")?;
        let report = runtime
            .block_on(pipeline::run(&config))
            .with_context(|| format!("render failed for {}", config.input_dir().display()))?;

        print_report(&report);
        Ok(())
    }

    fn into_config(self) -> Result<RunConfig> {
        Ok(RunConfig {
            max_depth: max_depth_from_flag(self.max_depth)?,
            workdir: self.workdir,
            root: self.root,
            output: self.output,
            hash_store: self.hash_store,
            hash_strategy: self.hash_strategy,
            ignore_suffix: self.ignore_suffix,
            skip_render_key: self.skip_render_key,
            ignore_value_file: self.ignore_value_file,
            post_renderer: self.post_renderer.filter(|p| !p.as_os_str().is_empty()),
            helm_bin: self.helm_bin,
            concurrency: self.concurrency,
        })
    }
}

fn max_depth_from_flag(depth: i64) -> Result<Option<usize>> {
    if depth == INFINITE_DEPTH {
        return Ok(None);
    }
    if depth < 0 {
        bail!("--max-depth must be -1 (unbounded) or a non-negative number, got {depth}");
    }
    let depth = usize::try_from(depth).context("--max-depth is too large")?;
    Ok(Some(depth))
}

fn parse_concurrency(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("concurrency must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn print_report(report: &WalkReport) {
    println!(
        "✓ rendered {}, unchanged {}, unsupported {}, pruned {}",
        report.rendered(),
        report.unchanged(),
        report.unsupported(),
        report.pruned.len()
    );

    for node in &report.nodes {
        match node {
            NodeResult::Rendered { name, .. } => println!("  ✎  {name}"),
            NodeResult::Unchanged { name, .. } => println!("  ·  {name}"),
            NodeResult::Unsupported { name, .. } => println!("  ?  {name} (unsupported)"),
        }
    }
    for path in &report.pruned {
        println!("  ✗  {}", path.display());
    }
}
