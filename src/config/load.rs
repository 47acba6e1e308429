use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use toml::Value;

use super::PipelineConfig;

/// Load configuration files in order; tables from later files are merged
/// key-by-key over earlier ones.
pub fn load_pipeline_config(paths: &[PathBuf]) -> Result<PipelineConfig> {
    if paths.is_empty() {
        return Err(anyhow!("at least one configuration file is required"));
    }

    let mut merged = Value::Table(Default::default());
    for path in paths {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let value: Value = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        merge_values(&mut merged, value);
    }

    let config: PipelineConfig = merged
        .try_into()
        .context("failed to deserialize merged configuration")?;
    config.validate()?;
    Ok(config)
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
