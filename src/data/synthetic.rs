// ============================================================
// Layer 4 — Synthetic Image Data
// ============================================================
// Linearly separable toy images for smoke runs and tests.
//
// Class k gets one "centre" per channel, alternating sign so
// classes 0 and 1 sit on opposite sides of the origin:
//
//   pixel(c) = centre_k(c) + U(-jitter, jitter)
//
// Every pixel of a channel holds the same value, so the pooled
// embedding of a sample equals its channel values exactly.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::dataset::ImageSample;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub samples:     usize,
    pub num_classes: usize,
    pub channels:    usize,
    pub height:      usize,
    pub width:       usize,
    /// Distance of each class centre from the origin, per channel.
    pub separation:  f32,
    /// Half-width of the uniform noise added to the centre.
    pub jitter:      f32,
    pub seed:        u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            samples:     512,
            num_classes: 2,
            channels:    2,
            height:      1,
            width:       1,
            separation:  2.0,
            jitter:      1.5,
            seed:        0,
        }
    }
}

impl SyntheticConfig {
    pub fn shape(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    fn centre(&self, label: usize, channel: usize) -> f32 {
        // Two classes: ±separation. More classes: rotate which channel is positive.
        if self.num_classes <= 2 {
            if label == 0 { -self.separation } else { self.separation }
        } else if channel % self.num_classes == label {
            self.separation
        } else {
            -self.separation
        }
    }

    /// Balanced samples, labels cycling 0, 1, …, num_classes-1.
    pub fn generate(&self) -> Vec<ImageSample> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let plane   = self.height * self.width;

        (0..self.samples)
            .map(|i| {
                let label  = i % self.num_classes.max(1);
                let mut pixels = Vec::with_capacity(self.channels * plane);
                for c in 0..self.channels {
                    let noise = if self.jitter > 0.0 { rng.gen_range(-self.jitter..self.jitter) } else { 0.0 };
                    let value = self.centre(label, c) + noise;
                    pixels.extend(std::iter::repeat(value).take(plane));
                }
                ImageSample { pixels, label }
            })
            .collect()
    }
}
