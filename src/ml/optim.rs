// ============================================================
// Layer 5 — Optimizer & Learning-Rate Schedule Factory
// ============================================================
// Builds the optimizer for one parameter group plus an optional
// step-decay schedule:
//
//   lr(epoch) = base_lr × gamma^(epoch / step_size)     gamma = 0.1
//
// SGD with no explicit tuning parameters gets the defaults
// used across the trojan experiments:
//   momentum 0.9, weight decay 2e-4, Nesterov acceleration.
//
// The optimizer only updates parameters that received a
// gradient, so the group is applied by filtering gradients
// (see params::retain_grads) before every step.

use std::{collections::HashSet, fmt, str::FromStr};

use burn::{
    module::ParamId,
    optim::{
        decay::WeightDecayConfig, momentum::MomentumConfig, AdamConfig, AdamWConfig,
        GradientsParams, Optimizer, SgdConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::ml::network::Network;
use crate::ml::params::param_ids;

// ─── Parameter groups ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ParamGroup {
    Full,
    Features,
    /// Also selected by the name "partial".
    Classifier,
    Explicit(Vec<ParamId>),
}

impl ParamGroup {
    /// Parameter ids of `network` that belong to this group.
    pub fn ids<B: Backend>(&self, network: &Network<B>) -> HashSet<ParamId> {
        match self {
            ParamGroup::Full       => param_ids::<B, _>(network).into_iter().collect(),
            ParamGroup::Features   => param_ids::<B, _>(&network.features).into_iter().collect(),
            ParamGroup::Classifier => param_ids::<B, _>(&network.classifier).into_iter().collect(),
            ParamGroup::Explicit(ids) => ids.iter().cloned().collect(),
        }
    }
}

impl FromStr for ParamGroup {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full"                    => Ok(ParamGroup::Full),
            "features"                => Ok(ParamGroup::Features),
            "classifier" | "partial"  => Ok(ParamGroup::Classifier),
            other => Err(ModelError::NotImplemented(format!("parameter group '{other}'"))),
        }
    }
}

impl fmt::Display for ParamGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamGroup::Full          => write!(f, "full"),
            ParamGroup::Features      => write!(f, "features"),
            ParamGroup::Classifier    => write!(f, "classifier"),
            ParamGroup::Explicit(ids) => write!(f, "explicit({} params)", ids.len()),
        }
    }
}

// ─── Optimizer kinds ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Sgd,
    Adam,
    AdamW,
}

impl FromStr for OptimizerKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sgd"   => Ok(OptimizerKind::Sgd),
            "adam"  => Ok(OptimizerKind::Adam),
            "adamw" => Ok(OptimizerKind::AdamW),
            _ => Err(ModelError::NotImplemented(format!("optimizer type '{s}'"))),
        }
    }
}

/// Everything needed to build an optimizer and its schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub lr:           f64,
    /// "full", "features", "classifier" or "partial"
    pub parameters:   String,
    pub optim_type:   String,
    pub momentum:     Option<f64>,
    pub weight_decay: Option<f64>,
    pub nesterov:     Option<bool>,
    pub lr_scheduler: bool,
    pub step_size:    usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            lr:           0.1,
            parameters:   "full".to_string(),
            optim_type:   "sgd".to_string(),
            momentum:     None,
            weight_decay: None,
            nesterov:     None,
            lr_scheduler: true,
            step_size:    30,
        }
    }
}

impl OptimizerConfig {
    fn has_tuning(&self) -> bool {
        self.momentum.is_some() || self.weight_decay.is_some() || self.nesterov.is_some()
    }
}

type StepFn<B> = Box<dyn FnMut(f64, Network<B>, GradientsParams) -> Network<B>>;

/// An optimizer bound to one parameter group of a [`Network`].
pub struct ModelOptimizer<B: AutodiffBackend> {
    kind:  OptimizerKind,
    group: ParamGroup,
    lr:    f64,
    step:  StepFn<B>,
}

impl<B: AutodiffBackend> ModelOptimizer<B> {
    pub fn kind(&self) -> OptimizerKind { self.kind }

    pub fn group(&self) -> &ParamGroup { &self.group }

    /// Base learning rate (before any schedule).
    pub fn lr(&self) -> f64 { self.lr }

    pub fn step(&mut self, lr: f64, network: Network<B>, grads: GradientsParams) -> Network<B> {
        (self.step)(lr, network, grads)
    }
}

impl<B: AutodiffBackend> fmt::Debug for ModelOptimizer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelOptimizer")
            .field("kind", &self.kind)
            .field("group", &self.group)
            .field("lr", &self.lr)
            .finish()
    }
}

/// Build the optimizer (and schedule, if requested) described by `cfg`.
pub fn define_optimizer<B: AutodiffBackend>(cfg: &OptimizerConfig) -> Result<(ModelOptimizer<B>, Option<StepLr>)> {
    let group: ParamGroup = cfg.parameters.parse()?;
    define_optimizer_for(cfg, group)
}

/// Same as [`define_optimizer`] with an explicit parameter group, e.g. a
/// hand-picked list of parameter ids.
pub fn define_optimizer_for<B: AutodiffBackend>(
    cfg:   &OptimizerConfig,
    group: ParamGroup,
) -> Result<(ModelOptimizer<B>, Option<StepLr>)> {
    let kind: OptimizerKind = cfg.optim_type.parse()?;

    let step: StepFn<B> = match kind {
        OptimizerKind::Sgd => {
            let (momentum, weight_decay, nesterov) = if cfg.has_tuning() {
                (cfg.momentum.unwrap_or(0.0), cfg.weight_decay.unwrap_or(0.0), cfg.nesterov.unwrap_or(false))
            } else {
                (0.9, 2e-4, true)
            };
            let mut sgd = SgdConfig::new();
            if momentum > 0.0 {
                sgd = sgd.with_momentum(Some(
                    MomentumConfig::new()
                        .with_momentum(momentum)
                        .with_dampening(0.0)
                        .with_nesterov(nesterov),
                ));
            }
            if weight_decay > 0.0 {
                sgd = sgd.with_weight_decay(Some(WeightDecayConfig::new(weight_decay as f32)));
            }
            let mut optim = sgd.init();
            Box::new(move |lr: f64, network: Network<B>, grads: GradientsParams| optim.step(lr, network, grads))
        }
        OptimizerKind::Adam => {
            let mut adam = AdamConfig::new();
            if let Some(wd) = cfg.weight_decay {
                adam = adam.with_weight_decay(Some(WeightDecayConfig::new(wd as f32)));
            }
            let mut optim = adam.init();
            Box::new(move |lr: f64, network: Network<B>, grads: GradientsParams| optim.step(lr, network, grads))
        }
        OptimizerKind::AdamW => {
            let mut adamw = AdamWConfig::new();
            if let Some(wd) = cfg.weight_decay {
                adamw = adamw.with_weight_decay(wd as f32);
            }
            let mut optim = adamw.init();
            Box::new(move |lr: f64, network: Network<B>, grads: GradientsParams| optim.step(lr, network, grads))
        }
    };

    let schedule = cfg.lr_scheduler.then(|| StepLr::new(cfg.lr, cfg.step_size));
    tracing::debug!("Optimizer {:?} on '{}' params, lr={}, schedule={}", kind, group, cfg.lr, schedule.is_some());

    Ok((ModelOptimizer { kind, group, lr: cfg.lr, step }, schedule))
}

// ─── StepLr ──────────────────────────────────────────────────────────────────
/// Epoch-level step decay. `lr()` is the rate for the current epoch and
/// `step()` is called once at the end of every epoch.
#[derive(Debug, Clone)]
pub struct StepLr {
    base_lr:   f64,
    step_size: usize,
    gamma:     f64,
    epoch:     usize,
}

impl StepLr {
    pub fn new(base_lr: f64, step_size: usize) -> Self {
        Self { base_lr, step_size, gamma: 0.1, epoch: 0 }
    }

    pub fn lr(&self) -> f64 {
        if self.step_size == 0 {
            return self.base_lr;
        }
        self.base_lr * self.gamma.powi((self.epoch / self.step_size) as i32)
    }

    pub fn step(&mut self) {
        self.epoch += 1;
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::network::NetworkConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_param_group_names() {
        assert_eq!("full".parse::<ParamGroup>().unwrap(), ParamGroup::Full);
        assert_eq!("partial".parse::<ParamGroup>().unwrap(), ParamGroup::Classifier);
        assert_eq!("classifier".parse::<ParamGroup>().unwrap(), ParamGroup::Classifier);
        assert!(matches!("head".parse::<ParamGroup>(), Err(ModelError::NotImplemented(_))));
    }

    #[test]
    fn test_unknown_optimizer_is_not_implemented() {
        let cfg = OptimizerConfig { optim_type: "lbfgs".into(), ..Default::default() };
        assert!(matches!(define_optimizer::<TestBackend>(&cfg), Err(ModelError::NotImplemented(_))));
    }

    #[test]
    fn test_group_ids_partition_network() {
        let device  = Default::default();
        let network = NetworkConfig::new(4)
            .with_in_channels(3)
            .with_conv_depth(1)
            .with_conv_dim(8)
            .with_fc_depth(2)
            .with_fc_dim(16)
            .init::<TestBackend>(&device);

        let full       = ParamGroup::Full.ids(&network);
        let features   = ParamGroup::Features.ids(&network);
        let classifier = ParamGroup::Classifier.ids(&network);
        assert!(features.is_disjoint(&classifier));
        assert!(features.is_subset(&full) && classifier.is_subset(&full));
        // two linear layers, weight + bias each
        assert_eq!(classifier.len(), 4);
    }

    #[test]
    fn test_step_lr_decay() {
        let mut s = StepLr::new(0.1, 2);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(s.lr());
            s.step();
        }
        assert!((seen[0] - 0.1).abs() < 1e-12);
        assert!((seen[1] - 0.1).abs() < 1e-12);
        assert!((seen[2] - 0.01).abs() < 1e-12);
        assert!((seen[4] - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_schedule_is_optional() {
        let cfg = OptimizerConfig { lr_scheduler: false, ..Default::default() };
        let (optim, schedule) = define_optimizer::<TestBackend>(&cfg).unwrap();
        assert!(schedule.is_none());
        assert_eq!(optim.kind(), OptimizerKind::Sgd);
        assert_eq!(optim.group(), &ParamGroup::Full);
    }

    #[test]
    fn test_classifier_only_step_leaves_features_untouched() {
        use crate::ml::network::ImageNetwork;
        use crate::ml::params::{param_values, retain_grads};
        use burn::tensor::Distribution;

        let device  = Default::default();
        let network = NetworkConfig::new(3)
            .with_in_channels(2)
            .with_conv_depth(1)
            .with_conv_dim(4)
            .init::<TestBackend>(&device);
        let cfg = OptimizerConfig { parameters: "partial".into(), lr_scheduler: false, ..Default::default() };
        let (mut optim, _) = define_optimizer::<TestBackend>(&cfg).unwrap();

        let x     = Tensor::<TestBackend, 4>::random([4, 2, 5, 5], Distribution::Default, &device);
        let loss  = network.forward(x).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &network);
        let grads = retain_grads::<TestBackend, _>(&network, grads, &optim.group().ids(&network));

        let conv_before = param_values::<TestBackend, _>(&network.features.blocks[0].conv);
        let head_before = param_values::<TestBackend, _>(&network.classifier);
        let updated     = optim.step(0.1, network, grads);
        assert_eq!(param_values::<TestBackend, _>(&updated.features.blocks[0].conv), conv_before);
        assert_ne!(param_values::<TestBackend, _>(&updated.classifier), head_before);
    }
}
