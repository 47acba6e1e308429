use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::tokenizer::NEW_LINE_TOKEN;

/// Statistics recorded for one form in `_properties.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormProperties {
    /// `[height, width]` of the stored crop.
    pub crop_shape: [u32; 2],
    /// Characters in the paragraph label.
    pub label_length: usize,
    pub num_lines: usize,
}

impl FormProperties {
    pub fn new(crop: &GrayImage, label: &str) -> Self {
        Self {
            crop_shape: [crop.height(), crop.width()],
            label_length: label.chars().count(),
            num_lines: num_lines(label),
        }
    }
}

pub fn num_lines(label: &str) -> usize {
    label.matches(NEW_LINE_TOKEN).count() + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinMax<T> {
    pub min: T,
    pub max: T,
}

/// Aggregate bounds over every prepared form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProperties {
    pub label_length: MinMax<usize>,
    pub num_lines: MinMax<usize>,
    pub crop_shape: MinMax<[u32; 2]>,
    /// Width over height.
    pub aspect_ratio: MinMax<f64>,
}

impl DatasetProperties {
    pub fn from_forms(forms: &BTreeMap<String, FormProperties>) -> Result<Self> {
        if forms.is_empty() {
            return Err(anyhow!("dataset properties contain no forms"));
        }

        let label_lengths: Vec<usize> = forms.values().map(|p| p.label_length).collect();
        let line_counts: Vec<usize> = forms.values().map(|p| p.num_lines).collect();

        let flat: Vec<u32> = forms.values().flat_map(|p| p.crop_shape).collect();
        let shapes = Array2::from_shape_vec((forms.len(), 2), flat)
            .context("failed to arrange crop shapes")?;
        let shape_min = shapes.fold_axis(Axis(0), u32::MAX, |acc, &v| (*acc).min(v));
        let shape_max = shapes.fold_axis(Axis(0), 0, |acc, &v| (*acc).max(v));

        let heights = shapes.column(0).mapv(f64::from);
        let widths = shapes.column(1).mapv(f64::from);
        let aspect: Array1<f64> = &widths / &heights;

        Ok(Self {
            label_length: min_max(&label_lengths),
            num_lines: min_max(&line_counts),
            crop_shape: MinMax {
                min: [shape_min[0], shape_min[1]],
                max: [shape_max[0], shape_max[1]],
            },
            aspect_ratio: MinMax {
                min: aspect.fold(f64::INFINITY, |acc, &v| acc.min(v)),
                max: aspect.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)),
            },
        })
    }
}

fn min_max(values: &[usize]) -> MinMax<usize> {
    MinMax {
        min: values.iter().copied().min().unwrap_or_default(),
        max: values.iter().copied().max().unwrap_or_default(),
    }
}

pub(crate) fn read_form_properties(path: &Path) -> Result<BTreeMap<String, FormProperties>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read properties {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse properties {}", path.display()))
}

/// Pretty JSON with four-space indentation; non-ASCII text is written as-is.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    fs::write(path, buffer).with_context(|| format!("failed to write {}", path.display()))
}
