// ============================================================
// Layer 5 — Loss Criterion
// ============================================================
// (logits [batch, num_classes], labels [batch]) → scalar loss.
// Generic over the backend so the same criterion scores the
// autodiff forward pass in training and the inner-backend pass
// during validation.

use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};

pub trait Criterion {
    fn loss<B: Backend>(&self, logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1>;
}

/// Cross-entropy, optionally weighted per class.
#[derive(Debug, Clone, Default)]
pub struct CrossEntropy {
    weights: Option<Vec<f32>>,
}

impl CrossEntropy {
    pub fn new(weights: Option<Vec<f32>>) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> Option<&[f32]> {
        self.weights.as_deref()
    }
}

impl Criterion for CrossEntropy {
    fn loss<B: Backend>(&self, logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        CrossEntropyLossConfig::new()
            .with_weights(self.weights.clone())
            .init(&logits.device())
            .forward(logits, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_uniform_logits_give_log_num_classes() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 4], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 3], &device);
        let loss: f32 = CrossEntropy::default().loss(logits, labels).into_scalar();
        assert!((loss - 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_weights_change_the_loss() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[2.0, 0.0], [0.0, 0.5]], &device);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([0, 0], &device);
        let plain: f32    = CrossEntropy::default().loss(logits.clone(), labels.clone()).into_scalar();
        let weighted: f32 = CrossEntropy::new(Some(vec![1.0, 5.0])).loss(logits, labels).into_scalar();
        // both labels are class 0, so a weight on class 1 leaves the mean unchanged
        assert!((plain - weighted).abs() < 1e-5);
    }
}
