pub mod config;
pub mod dataset;
pub mod tokenizer;

pub use config::{DatasetConfig, DimsConfig, LoaderConfig, PipelineConfig, load_pipeline_config};
pub use dataset::{
    DataConfig, DataModule, DataModuleRegistry, DatasetProperties, DatasetSplit, FormsSource,
    ParagraphBatch, ParagraphBatcher, ParagraphCache, ParagraphDataset, ParagraphItem,
    ParagraphsDataModule, SplitIds, Stage, extract_archive, validate_input_and_output_dimensions,
};
pub use tokenizer::{ParagraphVocab, SharedVocab, convert_strings_to_labels};
