use std::path::Path;

use probe_core::HarnessConfig;

/// File name written by `probectl init`.
pub const CONFIG_FILE: &str = "probe.toml";

pub fn init(path: &Path) -> anyhow::Result<()> {
    let output = path.join(CONFIG_FILE);
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }
    std::fs::create_dir_all(path)?;
    std::fs::write(&output, HarnessConfig::default().to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
