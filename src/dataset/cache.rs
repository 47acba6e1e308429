use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result, ensure};
use image::GrayImage;
use tracing::info;

use super::crops::{SplitCrops, build_split_crops};
use super::forms::FormsSource;
use super::properties::{
    DatasetProperties, FormProperties, read_form_properties, write_json,
};
use super::DatasetSplit;
use crate::config::DatasetConfig;

/// Crops and labels of one processed split, sorted by form id.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSplit {
    pub ids: Vec<String>,
    pub crops: Vec<GrayImage>,
    pub labels: Vec<String>,
}

impl ProcessedSplit {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// On-disk cache of paragraph crops, labels and dataset properties under
/// `processed_dir`.
///
/// `_properties.json` is written last and marks the cache as complete; a
/// run that stops before it is regenerated from scratch next time.
#[derive(Debug, Clone)]
pub struct ParagraphCache {
    cfg: DatasetConfig,
}

impl ParagraphCache {
    pub fn new(cfg: &DatasetConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn is_prepared(&self) -> bool {
        self.cfg.properties_path().is_file()
    }

    /// Build every split and persist it. Returns `false` without touching
    /// anything when the properties file already exists.
    pub fn prepare(&self) -> Result<bool> {
        if self.is_prepared() {
            info!(
                "Processed paragraphs found at {}",
                self.cfg.processed_dir.display()
            );
            return Ok(false);
        }

        let source = FormsSource::new(&self.cfg);
        source.prepare_data()?;
        let split_ids = source.split_ids()?.resolved();

        let mut properties = BTreeMap::new();
        for split in DatasetSplit::ALL {
            let crops = build_split_crops(
                &source,
                split_ids.ids(split),
                split,
                self.cfg.image_scale_factor,
            )?;
            self.save_crops_and_labels(split, &crops)?;
            for (id, crop, label) in crops.iter() {
                properties.insert(id.to_string(), FormProperties::new(crop, label));
            }
            info!("Prepared {} {split} paragraphs", crops.len());
        }

        write_json(&self.cfg.properties_path(), &properties)?;
        info!(
            "Wrote properties for {} forms to {}",
            properties.len(),
            self.cfg.properties_path().display()
        );
        Ok(true)
    }

    pub fn save_crops_and_labels(&self, split: DatasetSplit, crops: &SplitCrops) -> Result<()> {
        let dir = self.cfg.split_dir(split);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;

        write_json(&self.cfg.labels_path(split), crops.labels())?;
        for (id, crop, _) in crops.iter() {
            let path = self.cfg.crop_path(id, split);
            crop.save(&path)
                .with_context(|| format!("failed to write crop {}", path.display()))?;
        }
        Ok(())
    }

    /// Crops and labels of a prepared split, ordered by form id.
    pub fn load(&self, split: DatasetSplit) -> Result<ProcessedSplit> {
        let labels_path = self.cfg.labels_path(split);
        let data = fs::read_to_string(&labels_path)
            .with_context(|| format!("failed to read labels {}", labels_path.display()))?;
        let labels: BTreeMap<String, String> = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse labels {}", labels_path.display()))?;

        let mut processed = ProcessedSplit::default();
        for (id, label) in labels {
            let path = self.cfg.crop_path(&id, split);
            let crop = image::open(&path)
                .with_context(|| format!("missing crop {} for labelled form {id}", path.display()))?
                .to_luma8();
            processed.ids.push(id);
            processed.crops.push(crop);
            processed.labels.push(label);
        }

        ensure!(
            processed.crops.len() == processed.labels.len(),
            "crop and label counts differ for {split}"
        );
        Ok(processed)
    }

    /// Per-form statistics exactly as stored on disk.
    pub fn form_properties(&self) -> Result<BTreeMap<String, FormProperties>> {
        read_form_properties(&self.cfg.properties_path())
    }

    pub fn properties(&self) -> Result<DatasetProperties> {
        DatasetProperties::from_forms(&self.form_properties()?)
    }
}
