use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// One image and its class. Pixels are stored channel-major (C, H, W).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSample {
    pub pixels: Vec<f32>,
    pub label:  usize,
}

pub struct ImageDataset {
    samples: Vec<ImageSample>,
    shape:   [usize; 3],
}

impl ImageDataset {
    /// Every sample must hold exactly `C × H × W` pixels.
    pub fn new(samples: Vec<ImageSample>, shape: [usize; 3]) -> Result<Self> {
        let expected = shape.iter().product::<usize>();
        if let Some((i, bad)) = samples.iter().enumerate().find(|(_, s)| s.pixels.len() != expected) {
            return Err(ModelError::InvalidArgument(format!(
                "sample {i} has {} pixels, expected {expected} for shape {shape:?}",
                bad.pixels.len()
            )));
        }
        Ok(Self { samples, shape })
    }

    pub fn shape(&self) -> [usize; 3] { self.shape }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Number of samples per class, indexed by label.
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; num_classes];
        for sample in &self.samples {
            if let Some(c) = counts.get_mut(sample.label) {
                *c += 1;
            }
        }
        counts
    }
}

impl Dataset<ImageSample> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
