use std::fmt;

use anyhow::{Result, anyhow};
use indexmap::IndexMap;

use super::batcher::ParagraphDataset;
use super::paragraphs::{DataConfig, ParagraphsDataModule, Stage};
use super::DatasetSplit;
use crate::config::PipelineConfig;

/// Common surface of the data modules a training run can select by name.
pub trait DataModule: fmt::Display {
    fn prepare_data(&self) -> Result<bool>;
    fn setup(&mut self, stage: Option<Stage>) -> Result<()>;
    fn config(&self) -> DataConfig;
    fn dataset(&self, split: DatasetSplit) -> Option<&ParagraphDataset>;
}

impl DataModule for ParagraphsDataModule {
    fn prepare_data(&self) -> Result<bool> {
        ParagraphsDataModule::prepare_data(self)
    }

    fn setup(&mut self, stage: Option<Stage>) -> Result<()> {
        ParagraphsDataModule::setup(self, stage)
    }

    fn config(&self) -> DataConfig {
        ParagraphsDataModule::config(self)
    }

    fn dataset(&self, split: DatasetSplit) -> Option<&ParagraphDataset> {
        ParagraphsDataModule::dataset(self, split)
    }
}

pub type DataModuleConstructor = fn(&PipelineConfig) -> Result<Box<dyn DataModule>>;

/// Name to constructor table, filled explicitly at startup.
#[derive(Clone, Default)]
pub struct DataModuleRegistry {
    constructors: IndexMap<String, DataModuleConstructor>,
}

impl DataModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("b_iam_paragraphs", |cfg| {
            Ok(Box::new(ParagraphsDataModule::new(cfg)?) as Box<dyn DataModule>)
        });
        registry
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, constructor: DataModuleConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn build(&self, name: &str, config: &PipelineConfig) -> Result<Box<dyn DataModule>> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            anyhow!(
                "unknown data module `{name}` (available: {})",
                self.names().collect::<Vec<_>>().join(", ")
            )
        })?;
        constructor(config)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}
