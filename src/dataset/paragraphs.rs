use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::tensor::backend::Backend;
use serde::Serialize;
use tracing::info;

use super::batcher::{ParagraphBatch, ParagraphBatcher, ParagraphDataset};
use super::cache::ParagraphCache;
use super::validate::validate_input_and_output_dimensions;
use super::DatasetSplit;
use crate::config::{DatasetConfig, LoaderConfig, PipelineConfig};
use crate::tokenizer::{SharedVocab, convert_strings_to_labels, load_vocab};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fit,
    Test,
}

/// Settings a model needs to be built against this data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataConfig {
    pub input_dims: [usize; 3],
    pub output_dims: [usize; 2],
    pub mapping: Vec<String>,
}

/// B_IAM paragraphs: prepares the crop cache, checks the configured
/// dimensions against it and serves encoded splits.
pub struct ParagraphsDataModule {
    dataset: DatasetConfig,
    loader: LoaderConfig,
    vocab: SharedVocab,
    cache: ParagraphCache,
    data_train: Option<ParagraphDataset>,
    data_val: Option<ParagraphDataset>,
    data_test: Option<ParagraphDataset>,
}

impl ParagraphsDataModule {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let vocab = load_vocab(&config.dataset)?;
        Ok(Self {
            cache: ParagraphCache::new(&config.dataset),
            dataset: config.dataset.clone(),
            loader: config.loader.clone(),
            vocab,
            data_train: None,
            data_val: None,
            data_test: None,
        })
    }

    pub fn prepare_data(&self) -> Result<bool> {
        self.cache.prepare()
    }

    /// Prepare if needed, validate dimensions, then load the splits for
    /// `stage` (all three when `None`).
    pub fn setup(&mut self, stage: Option<Stage>) -> Result<()> {
        self.prepare_data()?;

        let properties = self.cache.properties()?;
        validate_input_and_output_dimensions(
            &self.dataset.dims.input_dims(),
            &self.dataset.dims.output_dims(),
            &properties,
            self.dataset.image_scale_factor,
        )?;

        if matches!(stage, None | Some(Stage::Fit)) {
            self.data_train = Some(self.load_dataset(DatasetSplit::Train)?);
            self.data_val = Some(self.load_dataset(DatasetSplit::Val)?);
        }
        if matches!(stage, None | Some(Stage::Test)) {
            self.data_test = Some(self.load_dataset(DatasetSplit::Test)?);
        }
        Ok(())
    }

    pub fn load_dataset(&self, split: DatasetSplit) -> Result<ParagraphDataset> {
        let processed = self.cache.load(split)?;
        let targets = convert_strings_to_labels(
            &processed.labels,
            &self.vocab,
            self.dataset.dims.max_label_length,
        );
        info!("Loaded {} {split} paragraphs", processed.len());
        ParagraphDataset::new(processed.ids, processed.crops, targets)
    }

    pub fn config(&self) -> DataConfig {
        DataConfig {
            input_dims: self.dataset.dims.input_dims(),
            output_dims: self.dataset.dims.output_dims(),
            mapping: self.vocab.mapping(),
        }
    }

    pub fn vocab(&self) -> SharedVocab {
        Arc::clone(&self.vocab)
    }

    pub fn cache(&self) -> &ParagraphCache {
        &self.cache
    }

    pub fn dataset(&self, split: DatasetSplit) -> Option<&ParagraphDataset> {
        match split {
            DatasetSplit::Train => self.data_train.as_ref(),
            DatasetSplit::Val => self.data_val.as_ref(),
            DatasetSplit::Test => self.data_test.as_ref(),
        }
    }

    pub fn batcher(&self) -> ParagraphBatcher {
        ParagraphBatcher::new(self.dataset.dims.image_height, self.dataset.dims.image_width)
    }

    /// Loader over a split loaded by [`setup`](Self::setup); only the
    /// training split is shuffled.
    pub fn dataloader<B: Backend>(
        &self,
        split: DatasetSplit,
        device: &B::Device,
    ) -> Result<Arc<dyn DataLoader<B, ParagraphBatch<B>>>> {
        let dataset = self
            .dataset(split)
            .cloned()
            .ok_or_else(|| anyhow!("{split} split is not loaded; call setup first"))?;

        let mut builder = DataLoaderBuilder::new(self.batcher())
            .batch_size(self.loader.batch_size)
            .set_device(device.clone());
        if self.loader.num_workers > 0 {
            builder = builder.num_workers(self.loader.num_workers);
        }
        if split == DatasetSplit::Train {
            builder = builder.shuffle(self.loader.shuffle_seed);
        }
        Ok(builder.build(dataset))
    }
}

impl fmt::Display for ParagraphsDataModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "B_IAM Paragraphs Dataset")?;
        writeln!(f, "Num classes: {}", self.vocab.len())?;
        writeln!(f, "Input dims : {:?}", self.dataset.dims.input_dims())?;
        writeln!(f, "Output dims: {:?}", self.dataset.dims.output_dims())?;
        let size = |split| {
            self.dataset(split)
                .map(|data| burn::data::dataset::Dataset::len(data).to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        write!(
            f,
            "Train/val/test sizes: {}, {}, {}",
            size(DatasetSplit::Train),
            size(DatasetSplit::Val),
            size(DatasetSplit::Test)
        )
    }
}
