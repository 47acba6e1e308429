use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetSplit;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PipelineConfig {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.dataset.validate()?;
        ensure!(self.loader.batch_size > 0, "loader.batch_size must be positive");
        Ok(())
    }
}

/// Locations and shape settings for the B_IAM paragraph pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DatasetConfig {
    /// Zip archive holding `forms/`, `json/` and `task/`.
    pub archive_path: PathBuf,
    /// Directory the archive is extracted into.
    pub extracted_dir: PathBuf,
    /// Root of the processed crop/label cache.
    pub processed_dir: PathBuf,
    #[serde(default = "default_scale_factor")]
    pub image_scale_factor: u32,
    #[serde(default)]
    pub dims: DimsConfig,
    /// Optional JSON vocabulary replacing the built-in mapping.
    #[serde(default)]
    pub vocab_path: Option<PathBuf>,
}

impl DatasetConfig {
    pub fn new(
        archive_path: impl Into<PathBuf>,
        extracted_dir: impl Into<PathBuf>,
        processed_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            archive_path: archive_path.into(),
            extracted_dir: extracted_dir.into(),
            processed_dir: processed_dir.into(),
            image_scale_factor: default_scale_factor(),
            dims: DimsConfig::default(),
            vocab_path: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.archive_path.as_os_str().is_empty(),
            "dataset.archive_path must be set"
        );
        ensure!(
            !self.extracted_dir.as_os_str().is_empty(),
            "dataset.extracted_dir must be set"
        );
        ensure!(
            !self.processed_dir.as_os_str().is_empty(),
            "dataset.processed_dir must be set"
        );
        ensure!(
            self.image_scale_factor > 0,
            "dataset.image_scale_factor must be at least 1"
        );
        self.dims.validate()
    }

    pub fn forms_dir(&self) -> PathBuf {
        self.extracted_dir.join("forms")
    }

    pub fn json_dir(&self) -> PathBuf {
        self.extracted_dir.join("json")
    }

    pub fn split_file(&self, split: DatasetSplit) -> PathBuf {
        self.extracted_dir
            .join("task")
            .join(format!("{}_ids.txt", split.as_str()))
    }

    pub fn properties_path(&self) -> PathBuf {
        self.processed_dir.join("_properties.json")
    }

    pub fn split_dir(&self, split: DatasetSplit) -> PathBuf {
        self.processed_dir.join(split.as_str())
    }

    pub fn labels_path(&self, split: DatasetSplit) -> PathBuf {
        self.split_dir(split).join("_labels.json")
    }

    pub fn crop_path(&self, id: &str, split: DatasetSplit) -> PathBuf {
        self.split_dir(split).join(format!("{id}.png"))
    }

    pub fn vocab_path(&self) -> Option<&Path> {
        self.vocab_path.as_deref()
    }
}

/// Model-facing tensor dimensions the dataset must fit into.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct DimsConfig {
    #[serde(default = "default_image_side")]
    pub image_height: usize,
    #[serde(default = "default_image_side")]
    pub image_width: usize,
    #[serde(default = "default_max_label_length")]
    pub max_label_length: usize,
}

impl Default for DimsConfig {
    fn default() -> Self {
        Self {
            image_height: default_image_side(),
            image_width: default_image_side(),
            max_label_length: default_max_label_length(),
        }
    }
}

impl DimsConfig {
    /// `(channels, height, width)`.
    pub fn input_dims(&self) -> [usize; 3] {
        [1, self.image_height, self.image_width]
    }

    pub fn output_dims(&self) -> [usize; 2] {
        [self.max_label_length, 1]
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.image_height > 0 && self.image_width > 0,
            "dataset.dims image size must be positive"
        );
        ensure!(
            self.max_label_length >= 2,
            "dataset.dims.max_label_length must leave room for start and end tokens"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoaderConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub num_workers: usize,
    #[serde(default = "default_shuffle_seed")]
    pub shuffle_seed: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            num_workers: 0,
            shuffle_seed: default_shuffle_seed(),
        }
    }
}

fn default_scale_factor() -> u32 {
    2
}

fn default_image_side() -> usize {
    1000
}

fn default_max_label_length() -> usize {
    700
}

fn default_batch_size() -> usize {
    16
}

fn default_shuffle_seed() -> u64 {
    1337
}
