// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Stacks a Vec<ImageSample> into one image tensor and one
// label tensor:
//
//   Input:  N samples, each C×H×W pixels (channel-major)
//   Output: images [N, C, H, W], labels [N]
//
// All samples share one shape; ImageDataset checks this when
// it is built, so the flat reshape below cannot misalign.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ImageSample;
use crate::domain::mode::Mode;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// shape: [batch_size, C, H, W]
    pub images: Tensor<B, 4>,
    /// shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    pub device: B::Device,
    pub shape:  [usize; 3],
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, shape: [usize; 3]) -> Self {
        Self { device, shape }
    }
}

impl<B: Backend> Batcher<ImageSample, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageSample>) -> ImageBatch<B> {
        let batch_size = items.len();
        let [c, h, w]  = self.shape;

        let pixels: Vec<f32> = items.iter().flat_map(|s| s.pixels.iter().copied()).collect();
        let labels: Vec<i64> = items.iter().map(|s| s.label as i64).collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, c, h, w]);
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ImageBatch { images, labels }
    }
}

// ─── GetData ──────────────────────────────────────────────────────────────────
/// Extracts `(input, label)` from whatever a data loader yields.
///
/// The training loop never looks inside a batch itself, so poisoned or
/// otherwise rewritten batches only need their own implementation.
pub trait GetData<T, B: Backend> {
    fn get_data(&self, batch: T, mode: Mode) -> (Tensor<B, 4>, Tensor<B, 1, Int>);
}

/// Passes an [`ImageBatch`] through unchanged in both modes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageBatchData;

impl<B: Backend> GetData<ImageBatch<B>, B> for ImageBatchData {
    fn get_data(&self, batch: ImageBatch<B>, _mode: Mode) -> (Tensor<B, 4>, Tensor<B, 1, Int>) {
        (batch.images, batch.labels)
    }
}
