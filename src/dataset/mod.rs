mod archive;
mod batcher;
mod cache;
mod crops;
mod factory;
mod forms;
mod paragraphs;
mod properties;
mod splits;
mod validate;

use std::fmt;
use std::str::FromStr;

pub use archive::extract_archive;
pub use batcher::{ParagraphBatch, ParagraphBatcher, ParagraphDataset, ParagraphItem};
pub use cache::{ParagraphCache, ProcessedSplit};
pub use crops::{
    SplitCrops, build_split_crops, invert_image, load_form_image, resize_image, to_grayscale,
};
pub use factory::{DataModule, DataModuleConstructor, DataModuleRegistry};
pub use forms::{
    FormsSource, FormsSummary, line_strings_from_json, paragraph_from_lines, read_line_strings,
};
pub use paragraphs::{DataConfig, ParagraphsDataModule, Stage};
pub use properties::{DatasetProperties, FormProperties, MinMax, num_lines};
pub use splits::{SplitIds, read_split_ids};
pub use validate::validate_input_and_output_dimensions;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatasetSplit {
    Train,
    Val,
    Test,
}

impl DatasetSplit {
    /// Processing order; later splits win when an id is listed twice.
    pub const ALL: [DatasetSplit; 3] = [DatasetSplit::Train, DatasetSplit::Val, DatasetSplit::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetSplit::Train => "train",
            DatasetSplit::Val => "val",
            DatasetSplit::Test => "test",
        }
    }
}

impl fmt::Display for DatasetSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetSplit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(DatasetSplit::Train),
            "val" | "validation" => Ok(DatasetSplit::Val),
            "test" => Ok(DatasetSplit::Test),
            other => Err(format!("unknown split `{other}` (expected train, val or test)")),
        }
    }
}
