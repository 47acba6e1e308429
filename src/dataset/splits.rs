use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use super::DatasetSplit;
use crate::config::DatasetConfig;

/// Form ids listed by the static `task/<split>_ids.txt` files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitIds {
    train: Vec<String>,
    val: Vec<String>,
    test: Vec<String>,
}

impl SplitIds {
    pub fn new(train: Vec<String>, val: Vec<String>, test: Vec<String>) -> Self {
        Self { train, val, test }
    }

    pub fn read(cfg: &DatasetConfig) -> Result<Self> {
        Ok(Self {
            train: read_split_ids(&cfg.split_file(DatasetSplit::Train))?,
            val: read_split_ids(&cfg.split_file(DatasetSplit::Val))?,
            test: read_split_ids(&cfg.split_file(DatasetSplit::Test))?,
        })
    }

    pub fn ids(&self, split: DatasetSplit) -> &[String] {
        match split {
            DatasetSplit::Train => &self.train,
            DatasetSplit::Val => &self.val,
            DatasetSplit::Test => &self.test,
        }
    }

    /// Reverse lookup built train, val, test in turn. An id listed in more
    /// than one file keeps the last split and is reported.
    pub fn split_by_id(&self) -> BTreeMap<String, DatasetSplit> {
        let mut by_id = BTreeMap::new();
        for split in DatasetSplit::ALL {
            for id in self.ids(split) {
                if let Some(previous) = by_id.insert(id.clone(), split) {
                    if previous != split {
                        warn!("form {id} listed in both {previous} and {split}; using {split}");
                    }
                }
            }
        }
        by_id
    }

    /// Each id kept once, in the split [`split_by_id`](Self::split_by_id)
    /// resolves it to. File order is preserved.
    pub fn resolved(&self) -> Self {
        let owner = self.split_by_id();
        let keep = |split: DatasetSplit| -> Vec<String> {
            let mut seen = BTreeSet::new();
            self.ids(split)
                .iter()
                .filter(|id| owner.get(id.as_str()) == Some(&split) && seen.insert(id.as_str()))
                .cloned()
                .collect()
        };
        Self {
            train: keep(DatasetSplit::Train),
            val: keep(DatasetSplit::Val),
            test: keep(DatasetSplit::Test),
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One trimmed id per line, order and duplicates kept; blank lines skipped.
pub fn read_split_ids(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read split file {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
