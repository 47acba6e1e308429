use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};
use zip::ZipArchive;

/// Unpack `archive` into `target` unless `target/json` already holds parsed
/// label files. Returns whether anything was extracted.
pub fn extract_archive(archive: &Path, target: &Path) -> Result<bool> {
    if target.is_dir() && has_json_files(&target.join("json"))? {
        debug!("{} already extracted, skipping", target.display());
        return Ok(false);
    }

    fs::create_dir_all(target)
        .with_context(|| format!("failed to create directory {}", target.display()))?;

    let file = File::open(archive)
        .with_context(|| format!("failed to open archive {}", archive.display()))?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("failed to read archive {}", archive.display()))?;
    let entries = zip.len();
    zip.extract(target).with_context(|| {
        format!(
            "failed to extract {} into {}",
            archive.display(),
            target.display()
        )
    })?;

    info!(
        "Extracted {entries} entries from {} into {}",
        archive.display(),
        target.display()
    );
    Ok(true)
}

fn has_json_files(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            return Ok(true);
        }
    }
    Ok(false)
}
