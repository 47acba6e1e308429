pub mod core;
mod load;

pub use core::{DatasetConfig, DimsConfig, LoaderConfig, PipelineConfig};
pub use load::load_pipeline_config;
