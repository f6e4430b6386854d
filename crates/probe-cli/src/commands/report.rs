use std::path::Path;

use anyhow::Context;
use probe_report::RunReport;
use probe_state::ResultSnapshot;

use super::results_path;
use crate::ResultsArgs;

pub fn report(target: &ResultsArgs, format: &str) -> anyhow::Result<()> {
    let path = results_path(target)?;
    let snapshot =
        ResultSnapshot::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let report = RunReport::from_snapshot(&snapshot);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{report}"),
    }
    Ok(())
}

pub fn reset(target: &ResultsArgs) -> anyhow::Result<()> {
    let path = results_path(target)?;
    let count = probe_report::reset_failed_file(&path)
        .with_context(|| format!("resetting {}", path.display()))?;
    println!("Reset {count} failed probes to pending.");
    Ok(())
}

pub fn mark_unavailable(target: &ResultsArgs, skills: &Path) -> anyhow::Result<()> {
    let path = results_path(target)?;
    let updated = probe_report::mark_unavailable_file(&path, skills)?;
    println!("Updated {updated} entries in {}.", skills.display());
    Ok(())
}
