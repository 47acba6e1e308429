use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::GrayImage;
use serde_json::Value;

use super::archive::extract_archive;
use super::crops::load_form_image;
use super::splits::SplitIds;
use super::DatasetSplit;
use crate::config::DatasetConfig;
use crate::tokenizer::NEW_LINE_TOKEN;

/// View over the extracted B_IAM archive: form images, JSON transcriptions
/// and split lists.
#[derive(Debug, Clone)]
pub struct FormsSource {
    cfg: DatasetConfig,
}

impl FormsSource {
    pub fn new(cfg: &DatasetConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn prepare_data(&self) -> Result<bool> {
        extract_archive(&self.cfg.archive_path, &self.cfg.extracted_dir)
    }

    /// Sorted ids of every form with a JSON transcription.
    pub fn all_ids(&self) -> Result<Vec<String>> {
        Ok(self.json_filenames_by_id()?.into_keys().collect())
    }

    pub fn split_ids(&self) -> Result<SplitIds> {
        SplitIds::read(&self.cfg)
    }

    pub fn json_filenames_by_id(&self) -> Result<BTreeMap<String, PathBuf>> {
        files_by_stem(&self.cfg.json_dir(), "json")
    }

    pub fn form_filenames_by_id(&self) -> Result<BTreeMap<String, PathBuf>> {
        files_by_stem(&self.cfg.forms_dir(), "jpg")
    }

    pub fn json_path(&self, id: &str) -> PathBuf {
        self.cfg.json_dir().join(format!("{id}.json"))
    }

    pub fn form_path(&self, id: &str) -> PathBuf {
        self.cfg.forms_dir().join(format!("{id}.jpg"))
    }

    pub fn line_strings(&self, id: &str) -> Result<Vec<String>> {
        read_line_strings(&self.json_path(id))
    }

    pub fn paragraph_string(&self, id: &str) -> Result<String> {
        Ok(paragraph_from_lines(&self.line_strings(id)?))
    }

    pub fn line_strings_by_id(&self) -> Result<BTreeMap<String, Vec<String>>> {
        self.json_filenames_by_id()?
            .into_iter()
            .map(|(id, path)| Ok((id, read_line_strings(&path)?)))
            .collect()
    }

    pub fn paragraph_string_by_id(&self) -> Result<BTreeMap<String, String>> {
        Ok(self
            .line_strings_by_id()?
            .into_iter()
            .map(|(id, lines)| {
                let paragraph = paragraph_from_lines(&lines);
                (id, paragraph)
            })
            .collect())
    }

    /// Grayscale form image with inverted intensities.
    pub fn load_image(&self, id: &str) -> Result<GrayImage> {
        load_form_image(&self.form_path(id))
    }

    pub fn summary(&self) -> Result<FormsSummary> {
        let lines = self.line_strings_by_id()?;
        let splits = self.split_ids()?;
        Ok(FormsSummary {
            total_images: lines.len(),
            total_test_images: splits.ids(DatasetSplit::Test).len(),
            total_paragraphs: lines.len(),
            total_lines: lines.values().map(Vec::len).sum(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormsSummary {
    pub total_images: usize,
    pub total_test_images: usize,
    pub total_paragraphs: usize,
    pub total_lines: usize,
}

impl fmt::Display for FormsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BIAM Dataset\n\tTotal Images: {}\n\tTotal Test Images: {}\n\tTotal Paragraphs: {}\n\tTotal Lines: {}",
            self.total_images, self.total_test_images, self.total_paragraphs, self.total_lines
        )
    }
}

pub fn read_line_strings(path: &Path) -> Result<Vec<String>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read transcription {}", path.display()))?;
    let value: Value = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse transcription {}", path.display()))?;
    Ok(line_strings_from_json(&value))
}

/// Text of each `"line"` element in source order. A missing `"line"` key
/// gives no lines; a missing or non-string `"label"` gives an empty line.
pub fn line_strings_from_json(value: &Value) -> Vec<String> {
    let Some(lines) = value.get("line").and_then(Value::as_array) else {
        return Vec::new();
    };
    lines
        .iter()
        .map(|line| {
            line.get("label")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

pub fn paragraph_from_lines(lines: &[String]) -> String {
    lines.join(NEW_LINE_TOKEN)
}

fn files_by_stem(dir: &Path, extension: &str) -> Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            files.insert(stem.to_string(), path.clone());
        }
    }
    Ok(files)
}
