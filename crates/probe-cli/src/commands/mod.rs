pub mod init;
pub mod report;
pub mod run;

use std::path::PathBuf;

use probe_core::HarnessConfig;

use crate::ResultsArgs;

/// Load the harness configuration named by `target`; a missing file gives defaults.
pub fn load_config(target: &ResultsArgs) -> anyhow::Result<HarnessConfig> {
    Ok(HarnessConfig::load_or_default(&target.config)?)
}

/// The results file `target` points at, after config and flag overrides.
pub fn results_path(target: &ResultsArgs) -> anyhow::Result<PathBuf> {
    match &target.results {
        Some(path) => Ok(path.clone()),
        None => Ok(load_config(target)?.results.path),
    }
}
