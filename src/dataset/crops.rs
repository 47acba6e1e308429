use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

use super::forms::FormsSource;
use super::DatasetSplit;

/// Crops and paragraph labels of one split, keyed by form id. Both maps
/// always hold the same ids.
#[derive(Debug, Clone, Default)]
pub struct SplitCrops {
    crops: BTreeMap<String, GrayImage>,
    labels: BTreeMap<String, String>,
}

impl SplitCrops {
    pub fn insert(&mut self, id: String, crop: GrayImage, label: String) {
        self.crops.insert(id.clone(), crop);
        self.labels.insert(id, label);
    }

    pub fn crops(&self) -> &BTreeMap<String, GrayImage> {
        &self.crops
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GrayImage, &str)> {
        self.crops
            .iter()
            .zip(self.labels.values())
            .map(|((id, crop), label)| (id.as_str(), crop, label.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Build the downscaled crop and paragraph label of every form in `split`.
pub fn build_split_crops(
    source: &FormsSource,
    split_ids: &[String],
    split: DatasetSplit,
    scale_factor: u32,
) -> Result<SplitCrops> {
    let mut crops = SplitCrops::default();
    for id in split_ids {
        let image = source
            .load_image(id)
            .with_context(|| format!("failed to build {split} crop for form {id}"))?;
        let crop = resize_image(image, scale_factor)?;
        let label = source.paragraph_string(id)?;
        crops.insert(id.clone(), crop, label);
    }
    debug!("built {} {split} crops", crops.len());
    Ok(crops)
}

/// Load a form as 8-bit grayscale with strokes bright on a dark background.
pub fn load_form_image(path: &Path) -> Result<GrayImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to load image {}", path.display()))?;
    Ok(invert_image(to_grayscale(&image)))
}

/// Colour images use the ITU-R 601 luma weights with rounding; single
/// channel images are only narrowed to 8 bits.
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    if !image.color().has_color() {
        return image.to_luma8();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0.map(u32::from);
        Luma([((299 * r + 587 * g + 114 * b + 500) / 1000) as u8])
    })
}

pub fn invert_image(mut image: GrayImage) -> GrayImage {
    imageops::invert(&mut image);
    image
}

/// Shrink both sides by `scale_factor` (integer division) with bilinear
/// filtering. A factor of 1 returns the image untouched.
pub fn resize_image(image: GrayImage, scale_factor: u32) -> Result<GrayImage> {
    ensure!(scale_factor > 0, "image scale factor must be at least 1");
    if scale_factor == 1 {
        return Ok(image);
    }
    let width = (image.width() / scale_factor).max(1);
    let height = (image.height() / scale_factor).max(1);
    Ok(imageops::resize(&image, width, height, FilterType::Triangle))
}
