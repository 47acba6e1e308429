use std::sync::Arc;

use anyhow::{Result, ensure};
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use image::GrayImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// One crop with its fixed-length encoded label.
#[derive(Debug, Clone)]
pub struct ParagraphItem {
    pub id: String,
    pub image: GrayImage,
    pub target: Vec<u32>,
}

/// Order-aligned crops and targets of one split. Cloning shares the data.
#[derive(Debug, Clone)]
pub struct ParagraphDataset {
    ids: Arc<Vec<String>>,
    crops: Arc<Vec<GrayImage>>,
    targets: Arc<Vec<Vec<u32>>>,
    indices: Vec<usize>,
}

impl ParagraphDataset {
    pub fn new(ids: Vec<String>, crops: Vec<GrayImage>, targets: Vec<Vec<u32>>) -> Result<Self> {
        ensure!(
            crops.len() == targets.len() && ids.len() == crops.len(),
            "data and targets must be of equal length ({} ids, {} crops, {} targets)",
            ids.len(),
            crops.len(),
            targets.len()
        );
        let indices = (0..crops.len()).collect();
        Ok(Self {
            ids: Arc::new(ids),
            crops: Arc::new(crops),
            targets: Arc::new(targets),
            indices,
        })
    }

    /// Shuffle with `seed` and split into `(first, rest)` where `first`
    /// holds `fraction` of the items, rounded down.
    pub fn split(&self, fraction: f64, seed: u64) -> (Self, Self) {
        let mut indices = self.indices.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let first_len = ((indices.len() as f64) * fraction.clamp(0.0, 1.0)) as usize;
        let rest = indices.split_off(first_len);
        (self.select(indices), self.select(rest))
    }

    fn select(&self, indices: Vec<usize>) -> Self {
        Self {
            ids: Arc::clone(&self.ids),
            crops: Arc::clone(&self.crops),
            targets: Arc::clone(&self.targets),
            indices,
        }
    }
}

impl Dataset<ParagraphItem> for ParagraphDataset {
    fn get(&self, index: usize) -> Option<ParagraphItem> {
        let idx = *self.indices.get(index)?;
        Some(ParagraphItem {
            id: self.ids[idx].clone(),
            image: self.crops[idx].clone(),
            target: self.targets[idx].clone(),
        })
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

#[derive(Debug, Clone)]
pub struct ParagraphBatch<B: Backend> {
    /// `[batch, 1, height, width]`, intensities scaled to `0..=1`.
    pub images: Tensor<B, 4>,
    /// `[batch, output_length]`.
    pub targets: Tensor<B, 2, Int>,
}

/// Places each crop at the top-left of a zeroed `height x width` canvas
/// (anything beyond it is cut off) and stacks the targets.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphBatcher {
    height: usize,
    width: usize,
}

impl ParagraphBatcher {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    fn write_canvas(&self, image: &GrayImage, canvas: &mut [f32]) {
        let rows = (image.height() as usize).min(self.height);
        let cols = (image.width() as usize).min(self.width);
        for y in 0..rows {
            for x in 0..cols {
                let value = image.get_pixel(x as u32, y as u32).0[0];
                canvas[y * self.width + x] = f32::from(value) / 255.0;
            }
        }
    }
}

impl<B: Backend> Batcher<B, ParagraphItem, ParagraphBatch<B>> for ParagraphBatcher {
    fn batch(&self, items: Vec<ParagraphItem>, device: &B::Device) -> ParagraphBatch<B> {
        let batch = items.len();
        let plane = self.height * self.width;
        let length = items.first().map(|item| item.target.len()).unwrap_or(0);

        let mut pixels = vec![0.0f32; batch * plane];
        let mut targets = Vec::with_capacity(batch * length);
        for (item, canvas) in items.iter().zip(pixels.chunks_mut(plane.max(1))) {
            self.write_canvas(&item.image, canvas);
            targets.extend(item.target.iter().map(|&id| id as i64));
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch, 1, self.height, self.width]),
            device,
        );
        let targets =
            Tensor::<B, 2, Int>::from_data(TensorData::new(targets, [batch, length]), device);

        ParagraphBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn dataset(n: usize) -> ParagraphDataset {
        let ids = (0..n).map(|i| format!("f{i:02}")).collect();
        let crops = (0..n).map(|_| GrayImage::new(2, 2)).collect();
        let targets = (0..n).map(|i| vec![i as u32; 3]).collect();
        ParagraphDataset::new(ids, crops, targets).expect("dataset")
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = ParagraphDataset::new(
            vec!["a".into()],
            vec![GrayImage::new(1, 1)],
            Vec::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn get_returns_aligned_items() {
        let data = dataset(3);
        let item = data.get(1).expect("item");
        assert_eq!(item.id, "f01");
        assert_eq!(item.target, vec![1, 1, 1]);
        assert!(data.get(3).is_none());
    }

    #[test]
    fn split_is_seeded_and_exhaustive() {
        let data = dataset(10);
        let (a, b) = data.split(0.7, 42);
        let (c, _) = data.split(0.7, 42);
        assert_eq!(a.len(), 7);
        assert_eq!(b.len(), 3);

        let first: Vec<String> = (0..a.len()).map(|i| a.get(i).expect("a").id).collect();
        let again: Vec<String> = (0..c.len()).map(|i| c.get(i).expect("c").id).collect();
        assert_eq!(first, again);

        let mut all: Vec<String> = first
            .into_iter()
            .chain((0..b.len()).map(|i| b.get(i).expect("b").id))
            .collect();
        all.sort();
        assert_eq!(all, (0..10).map(|i| format!("f{i:02}")).collect::<Vec<_>>());
    }

    #[test]
    fn canvas_is_zero_padded_and_clipped() {
        let batcher = ParagraphBatcher::new(2, 3);
        let image = GrayImage::from_fn(4, 1, |x, _| Luma([(x * 85) as u8]));
        let mut canvas = vec![0.0; 6];
        batcher.write_canvas(&image, &mut canvas);
        assert_eq!(canvas, vec![0.0, 85.0 / 255.0, 170.0 / 255.0, 0.0, 0.0, 0.0]);
    }
}
