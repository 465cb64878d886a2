//! Manifold: digest-gated renderer for application document trees.
//!
//! # Usage
//!
//! ```text
//! manifold [--root bootstrap] [--workdir .] [--output .zz.auto-generated]
//!          [--max-depth -1] [--hash-store sumfile|json]
//!          [--hash-strategy readwrite|read] [--ignore-suffix -ignore]
//!          [--skip-render-key do-not-render]
//!          [--ignore-value-file overrides-to-ignore]
//!          [--post-renderer <path>] [--concurrency 10] [--helm-bin helm]
//! ```

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::render::RenderArgs;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "manifold",
    version,
    about = "Render an application document tree, re-rendering only nodes whose inputs changed",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    render: RenderArgs,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    cli.render.run()
}

/// Logs go to stderr so stdout carries only the run summary.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
