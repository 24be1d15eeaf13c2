// ============================================================
// Layer 5 — Data-Parallel Inference View
// ============================================================
// One replica of the network per device. A forward pass splits
// the batch along dim 0, runs each chunk on its own replica and
// gathers the logits back on the input's device:
//
//   x [N, C, H, W] ──chunk──▶ x₀ … xₖ ──replica i──▶ y₀ … yₖ ──cat──▶ y [N, classes]
//
// Replicas are snapshots. The owner rebuilds the view after
// every parameter change so it never serves stale weights.

use burn::prelude::*;

use crate::ml::network::{ImageNetwork, Network};

#[derive(Debug, Clone)]
pub struct ParallelView<B: Backend> {
    replicas: Vec<(B::Device, Network<B>)>,
}

impl<B: Backend> ParallelView<B> {
    /// Copy `network` onto every device in `devices`; `None` without devices.
    pub fn new(network: &Network<B>, devices: &[B::Device]) -> Option<Self> {
        if devices.is_empty() {
            return None;
        }
        let replicas = devices
            .iter()
            .map(|d| (d.clone(), network.clone().to_device(d)))
            .collect();
        Some(Self { replicas })
    }

    pub fn num_replicas(&self) -> usize {
        self.replicas.len()
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let home  = x.device();
        let parts = self.replicas.len().min(x.dims()[0]).max(1);

        let outputs = x
            .chunk(parts, 0)
            .into_iter()
            .zip(&self.replicas)
            .map(|(chunk, (device, replica))| replica.forward(chunk.to_device(device)).to_device(&home))
            .collect();
        Tensor::cat(outputs, 0)
    }
}
