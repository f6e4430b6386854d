use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use probe_core::extract::SnippetExtractor;
use probe_core::{Catalog, HarnessConfig};
use probe_runtime::{InterpreterBinder, Sandbox};
use probe_scheduler::{Orchestrator, OrchestratorConfig};
use probe_state::ResultStore;
use tracing::{info, warn};

use crate::ResultsArgs;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: ResultsArgs,
    /// Catalog manifest (overrides [catalog].manifest).
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
    /// Number of concurrent workers (overrides [pool].concurrency).
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Retries per probe (overrides [retry].max_retries).
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Do not print the live progress line.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Merge command-line overrides into the file configuration.
pub fn apply_overrides(config: &mut HarnessConfig, args: &RunArgs) {
    if let Some(manifest) = &args.manifest {
        config.catalog.manifest = manifest.clone();
    }
    if let Some(results) = &args.target.results {
        config.results.path = results.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.pool.concurrency = concurrency;
    }
    if let Some(max_retries) = args.max_retries {
        config.retry.max_retries = max_retries;
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = HarnessConfig::load_or_default(&args.target.config)
        .with_context(|| format!("loading {}", args.target.config.display()))?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let catalog = Catalog::load(&config.catalog.manifest)?;
    if catalog.is_empty() {
        info!(manifest = ?config.catalog.manifest, "catalog is empty, nothing to run");
        return Ok(());
    }
    let extractor = SnippetExtractor::new(&config.catalog.example_marker)
        .context("invalid catalog.example_marker")?;
    let probes = catalog.probes(&extractor);

    let store = ResultStore::load(&config.results.path);
    let network_timeout = config.sandbox.network_timeout()?;
    let binder = InterpreterBinder::new(
        config.sandbox.program.clone(),
        config.sandbox.args.clone(),
        config.sandbox.preamble.clone(),
        network_timeout,
    );

    let mut run_config = OrchestratorConfig::from_harness(&config)?;
    run_config.render_progress = !args.quiet;

    let orchestrator = Orchestrator::new(
        run_config,
        store,
        Sandbox::new(network_timeout),
        Arc::new(binder),
    );
    let summary = orchestrator.run(probes, interrupted()).await?;

    println!("{}", summary.counts);
    println!("Results saved to {}", config.results.path.display());
    Ok(())
}

/// Resolves on the first Ctrl-C.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received"),
        Err(e) => {
            warn!(error = %e, "failed to install interrupt handler");
            std::future::pending::<()>().await
        }
    }
}
