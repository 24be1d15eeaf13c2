// ============================================================
// Layer 5 — Gradient Scaler
// ============================================================
// Loss scaling for reduced-precision training:
//
//   scaled_loss = loss × scale          (before backward)
//   grad        = grad ÷ scale          (before the optimizer step)
//
// If any unscaled gradient is inf/NaN the step is skipped and
// the scale is halved. After `growth_interval` consecutive good
// steps the scale doubles again.

use burn::{
    module::AutodiffModule,
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::ml::params::unscale_grads;

#[derive(Config, Debug)]
pub struct GradScalerConfig {
    #[config(default = 65536.0)]
    pub init_scale:      f64,
    #[config(default = 2.0)]
    pub growth_factor:   f64,
    #[config(default = 0.5)]
    pub backoff_factor:  f64,
    #[config(default = 2000)]
    pub growth_interval: usize,
}

impl GradScalerConfig {
    pub fn init(&self) -> GradScaler {
        GradScaler {
            scale:           self.init_scale,
            growth_factor:   self.growth_factor,
            backoff_factor:  self.backoff_factor,
            growth_interval: self.growth_interval,
            good_steps:      0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradScaler {
    scale:           f64,
    growth_factor:   f64,
    backoff_factor:  f64,
    growth_interval: usize,
    good_steps:      usize,
}

impl GradScaler {
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn scale_loss<B: Backend>(&self, loss: Tensor<B, 1>) -> Tensor<B, 1> {
        loss.mul_scalar(self.scale)
    }

    /// Unscale `grads` in place. Returns whether the step should be taken,
    /// and adjusts the scale for the next iteration.
    pub fn unscale<B, M>(&mut self, module: &M, grads: &mut GradientsParams) -> bool
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        let finite = unscale_grads::<B, M>(module, grads, 1.0 / self.scale);
        self.update(finite);
        finite
    }

    fn update(&mut self, finite: bool) {
        if finite {
            self.good_steps += 1;
            if self.good_steps >= self.growth_interval {
                self.scale *= self.growth_factor;
                self.good_steps = 0;
            }
        } else {
            self.scale *= self.backoff_factor;
            self.good_steps = 0;
            tracing::debug!("Non-finite gradients, loss scale backed off to {}", self.scale);
        }
    }
}

impl Default for GradScaler {
    fn default() -> Self {
        GradScalerConfig::new().init()
    }
}
