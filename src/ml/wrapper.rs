// ============================================================
// Layer 5 — Model Wrapper
// ============================================================
// Owns one network plus everything needed to use it in an
// experiment:
//
//   ModelWrapper
//     ├─ network        canonical parameters (autodiff backend)
//     ├─ parallel       per-device inference replicas, optional
//     ├─ criterion      cross-entropy, weighted per class
//     ├─ store          {folder}/{name}{suffix}.pth
//     └─ active group   which parameters the next step may update
//
// Inference always runs on the inner backend through `valid()`,
// so no graph is recorded and dropout / batch norm behave as in
// evaluation. Training (see trainer.rs) is the only code that
// runs the autodiff network and mutates parameters.

use std::{
    collections::BTreeMap,
    fmt::Write as _,
    path::{Path, PathBuf},
};

use burn::{
    module::{AutodiffModule, Module},
    optim::GradientsParams,
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend, Distribution},
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::GetData;
use crate::domain::{
    dataset::{DatasetInfo, DatasetRef},
    mode::Mode,
    traits::DatasetDescriptor,
};
use crate::error::{ModelError, Result};
use crate::infra::{checkpoint::CheckpointStore, env::Env, metrics::topk_accuracy};
use crate::ml::{
    criterion::{Criterion, CrossEntropy},
    network::{ImageNetwork, Network, NetworkConfig},
    optim::{ModelOptimizer, ParamGroup},
    parallel::ParallelView,
    params::retain_grads,
    registry::{ModelFamily, Registry},
};

/// The non-autodiff backend every inference call runs on.
pub type Inner<B> = <B as AutodiffBackend>::InnerBackend;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Where per-class loss weights come from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossWeights {
    /// Use the dataset's weights, if it has any.
    #[default]
    FromDataset,
    Disabled,
    Explicit(Vec<f32>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrapperConfig {
    /// Family name, optionally with a layer number ("convnet4").
    pub name:              String,
    pub suffix:            String,
    pub folder_path:       Option<PathBuf>,
    /// Taken from the dataset when absent.
    pub num_classes:       Option<usize>,
    pub loss_weights:      LossWeights,
    pub in_channels:       usize,
    pub official:          bool,
    pub pretrain:          bool,
    pub randomized_smooth: bool,
    pub rs_sigma:          f64,
    pub rs_n:              usize,
    pub sgm:               bool,
    pub sgm_gamma:         f64,
}

impl WrapperConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:              name.into(),
            suffix:            String::new(),
            folder_path:       None,
            num_classes:       None,
            loss_weights:      LossWeights::FromDataset,
            in_channels:       3,
            official:          false,
            pretrain:          false,
            randomized_smooth: false,
            rs_sigma:          0.01,
            rs_n:              100,
            sgm:               false,
            sgm_gamma:         1.0,
        }
    }
}

/// Gaussian noise averaging for `get_logits`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub sigma: f64,
    pub n:     usize,
}

/// Overrides for where a checkpoint is read or written.
/// `file_path` wins over `folder_path` / `suffix`.
#[derive(Debug, Clone, Default)]
pub struct CheckpointTarget {
    pub file_path:   Option<PathBuf>,
    pub folder_path: Option<PathBuf>,
    pub suffix:      Option<String>,
}

impl CheckpointTarget {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { file_path: Some(path.into()), ..Default::default() }
    }

    pub fn resolve(&self, store: &CheckpointStore) -> PathBuf {
        match &self.file_path {
            Some(path) => path.clone(),
            None => store.path_for(self.folder_path.as_deref(), self.suffix.as_deref()),
        }
    }
}

// ─── ModelWrapper ────────────────────────────────────────────────────────────

pub struct ModelWrapper<B: AutodiffBackend> {
    name:           String,
    dataset:        Option<DatasetInfo>,
    num_classes:    usize,
    criterion:      CrossEntropy,
    store:          CheckpointStore,
    smoothing:      Option<Smoothing>,
    sgm_gamma:      Option<f64>,
    family:         ModelFamily,
    network_config: NetworkConfig,
    network:        Network<B>,
    parallel:       Option<ParallelView<Inner<B>>>,
    devices:        Vec<B::Device>,
    active:         Option<ParamGroup>,
    verbose:        bool,
}

impl<B: AutodiffBackend> ModelWrapper<B> {
    /// Build a wrapper from the built-in family registry.
    pub fn new(cfg: &WrapperConfig, dataset: Option<DatasetRef>, env: &Env<B>) -> Result<Self> {
        Self::with_registry(cfg, dataset, env, &Registry::builtin())
    }

    pub fn with_registry(
        cfg:      &WrapperConfig,
        dataset:  Option<DatasetRef>,
        env:      &Env<B>,
        registry: &Registry,
    ) -> Result<Self> {
        let dataset = match dataset {
            None                          => None,
            Some(DatasetRef::Resolved(d)) => Some(d),
            Some(DatasetRef::Name(name))  => return Err(ModelError::DatasetType(name)),
        };

        let num_classes = cfg
            .num_classes
            .or_else(|| dataset.as_ref().map(DatasetDescriptor::num_classes))
            .ok_or_else(|| ModelError::InvalidConfig("num_classes not given and no dataset to take it from".into()))?;

        let loss_weights = match &cfg.loss_weights {
            LossWeights::FromDataset => dataset.as_ref().and_then(|d| d.loss_weights()).map(<[f32]>::to_vec),
            LossWeights::Disabled    => None,
            LossWeights::Explicit(w) => Some(w.clone()),
        };
        if let Some(w) = &loss_weights {
            if w.len() != num_classes {
                return Err(ModelError::InvalidConfig(format!(
                    "{} loss weights for {num_classes} classes",
                    w.len()
                )));
            }
        }

        let folder = cfg.folder_path.clone().unwrap_or_else(|| match &dataset {
            Some(d) => env.model_dir.join(d.data_type()).join(d.name()),
            None    => env.model_dir.clone(),
        });

        let (family, layer) = registry.lookup(&cfg.name)?;
        let family          = family.clone();
        let network_config  = family.config(num_classes, cfg.in_channels, layer);
        network_config.check()?;
        let network: Network<B> = network_config.init(env.device());

        let image_data = dataset.as_ref().map_or(true, |d| d.data_type() == "image");
        let parallel   = (env.num_devices() > 1 && family.supports_data_parallel && image_data)
            .then(|| ParallelView::new(&network.valid(), &env.devices))
            .flatten();

        let mut wrapper = Self {
            name: cfg.name.clone(),
            dataset,
            num_classes,
            criterion: CrossEntropy::new(loss_weights),
            store: CheckpointStore::new(folder, cfg.name.clone(), cfg.suffix.clone()),
            smoothing: cfg.randomized_smooth.then_some(Smoothing { sigma: cfg.rs_sigma, n: cfg.rs_n }),
            sgm_gamma: cfg.sgm.then_some(cfg.sgm_gamma),
            family,
            network_config,
            network,
            parallel,
            devices: env.devices.clone(),
            active: None,
            verbose: env.verbose,
        };

        if cfg.sgm && !wrapper.network.has_skip_connections() {
            tracing::warn!("SGM is enabled but '{}' has no skip connections; it has no effect", wrapper.name);
        }
        if cfg.official {
            wrapper.load_official()?;
        }
        if cfg.pretrain {
            wrapper.load(&CheckpointTarget::default(), true, None)?;
        }
        let primary = env.device().clone();
        wrapper.to_device(&primary);

        tracing::debug!(
            "Model '{}' ready: {} classes, {} params, parallel={}",
            wrapper.name,
            wrapper.num_classes,
            wrapper.network.num_params(),
            wrapper.is_parallel(),
        );
        Ok(wrapper)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str { &self.name }

    pub fn suffix(&self) -> &str { self.store.suffix() }

    pub fn folder_path(&self) -> &Path { self.store.folder() }

    pub fn store(&self) -> &CheckpointStore { &self.store }

    pub fn dataset(&self) -> Option<&DatasetInfo> { self.dataset.as_ref() }

    pub fn num_classes(&self) -> usize { self.num_classes }

    pub fn loss_weights(&self) -> Option<&[f32]> { self.criterion.weights() }

    pub fn criterion(&self) -> &CrossEntropy { &self.criterion }

    pub fn family(&self) -> &ModelFamily { &self.family }

    pub fn network_config(&self) -> &NetworkConfig { &self.network_config }

    pub fn network(&self) -> &Network<B> { &self.network }

    pub fn smoothing(&self) -> Option<Smoothing> { self.smoothing }

    pub fn sgm_gamma(&self) -> Option<f64> { self.sgm_gamma }

    pub fn verbose(&self) -> bool { self.verbose }

    /// The primary device.
    pub fn device(&self) -> &B::Device {
        &self.devices[0]
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel.is_some()
    }

    pub fn active_params(&self) -> Option<&ParamGroup> {
        self.active.as_ref()
    }

    // ── Parameter activation ──────────────────────────────────────────────────

    /// Run `f` with `group` active (or nothing, for `None`), then restore the
    /// previous activation whether `f` succeeded or not.
    pub fn with_active_params<R, E>(
        &mut self,
        group: Option<ParamGroup>,
        f:     impl FnOnce(&mut Self) -> std::result::Result<R, E>,
    ) -> std::result::Result<R, E> {
        let previous = std::mem::replace(&mut self.active, group);
        let result   = f(self);
        self.active  = previous;
        result
    }

    /// Apply one optimizer step restricted to the active group.
    /// Returns false, leaving the network unchanged, when nothing is active.
    pub fn apply_step(&mut self, optim: &mut ModelOptimizer<B>, lr: f64, grads: GradientsParams) -> bool {
        let Some(group) = &self.active else {
            return false;
        };
        let keep  = group.ids(&self.network);
        let grads = retain_grads::<B, _>(&self.network, grads, &keep);
        self.network = optim.step(lr, self.network.clone(), grads);
        true
    }

    // ── Devices ───────────────────────────────────────────────────────────────

    /// Move the canonical network to `device` and make it the primary one.
    pub fn to_device(&mut self, device: &B::Device) {
        self.network    = self.network.clone().fork(device);
        self.devices[0] = device.clone();
        self.sync_parallel();
    }

    /// Rebuild the inference replicas from the canonical parameters.
    pub fn sync_parallel(&mut self) {
        if self.parallel.is_some() {
            self.parallel = ParallelView::new(&self.network.valid(), &self.devices);
        }
    }

    // ── Inference ─────────────────────────────────────────────────────────────

    fn eval_forward(&self, x: Tensor<Inner<B>, 4>) -> Tensor<Inner<B>, 2> {
        match &self.parallel {
            Some(view) => view.forward(x),
            None       => self.network.valid().forward(x),
        }
    }

    pub fn get_logits(&self, input: Tensor<Inner<B>, 4>) -> Tensor<Inner<B>, 2> {
        self.get_logits_with(input, self.smoothing)
    }

    /// `get_logits` with explicit smoothing in place of the wrapper's own.
    pub fn get_logits_with(&self, input: Tensor<Inner<B>, 4>, smoothing: Option<Smoothing>) -> Tensor<Inner<B>, 2> {
        smoothed_logits(|x| self.eval_forward(x), input, smoothing)
    }

    /// Logits from the canonical parameters, bypassing the parallel
    /// replicas. Used mid-epoch, before the replicas are resynced.
    pub fn current_logits(&self, input: Tensor<Inner<B>, 4>) -> Tensor<Inner<B>, 2> {
        let network = self.network.valid();
        smoothed_logits(|x| network.forward(x), input, self.smoothing)
    }

    pub fn get_fm(&self, input: Tensor<Inner<B>, 4>) -> Tensor<Inner<B>, 4> {
        self.network.valid().feature_map(input)
    }

    pub fn get_final_fm(&self, input: Tensor<Inner<B>, 4>) -> Tensor<Inner<B>, 2> {
        self.network.valid().embedding(input)
    }

    pub fn get_prob(&self, input: Tensor<Inner<B>, 4>) -> Tensor<Inner<B>, 2> {
        softmax(self.get_logits(input), 1)
    }

    /// Probability each example assigns to its own `target` class.
    pub fn get_target_prob(&self, input: Tensor<Inner<B>, 4>, target: Tensor<Inner<B>, 1, Int>) -> Tensor<Inner<B>, 1> {
        self.get_prob(input)
            .gather(1, target.unsqueeze_dim::<2>(1))
            .flatten::<1>(0, 1)
    }

    pub fn get_class(&self, input: Tensor<Inner<B>, 4>) -> Tensor<Inner<B>, 1, Int> {
        self.get_logits(input).argmax(1).flatten::<1>(0, 1)
    }

    /// The class ranked `idx`-th by descending logit for each example.
    /// With `same`, the most common of those (smallest class on a tie) is
    /// used for the whole batch.
    pub fn generate_target(&self, input: Tensor<Inner<B>, 4>, idx: usize, same: bool) -> Result<Tensor<Inner<B>, 1, Int>> {
        if idx >= self.num_classes {
            return Err(ModelError::InvalidArgument(format!(
                "target rank {idx} out of range for {} classes",
                self.num_classes
            )));
        }

        let logits     = self.get_logits(input);
        let [batch, _] = logits.dims();
        let device     = logits.device();
        let target     = logits
            .argsort_descending(1)
            .slice([0..batch, idx..idx + 1])
            .flatten::<1>(0, 1);

        if !same || batch == 0 {
            return Ok(target);
        }
        let ranked: Vec<i64> = target.into_data().iter::<i64>().collect();
        Ok(Tensor::full([batch], most_common(&ranked), &device))
    }

    /// Keep only the examples of `batch` the network classifies correctly.
    pub fn remove_misclassify<T, G>(&self, batch: T, get_data: &G) -> Option<(Tensor<Inner<B>, 4>, Tensor<Inner<B>, 1, Int>)>
    where
        G: GetData<T, Inner<B>>,
    {
        let (input, label) = get_data.get_data(batch, Mode::Valid);
        self.keep_correct(input, label)
    }

    /// `None` when no example survives.
    pub fn keep_correct(
        &self,
        input: Tensor<Inner<B>, 4>,
        label: Tensor<Inner<B>, 1, Int>,
    ) -> Option<(Tensor<Inner<B>, 4>, Tensor<Inner<B>, 1, Int>)> {
        let correct = self.get_class(input.clone()).equal(label.clone()).int();
        let keep: Vec<i64> = correct
            .into_data()
            .iter::<i64>()
            .enumerate()
            .filter(|(_, c)| *c != 0)
            .map(|(i, _)| i as i64)
            .collect();
        if keep.is_empty() {
            return None;
        }

        let index = Tensor::<Inner<B>, 1, Int>::from_ints(keep.as_slice(), &input.device());
        Some((input.select(0, index.clone()), label.select(0, index)))
    }

    /// Top-k accuracies (percent) of `logits` against `labels`.
    pub fn accuracy(&self, logits: Tensor<Inner<B>, 2>, labels: Tensor<Inner<B>, 1, Int>, topk: &[usize]) -> Vec<f64> {
        let [_, classes] = logits.dims();
        let logits: Vec<f32> = logits.into_data().iter::<f32>().collect();
        let labels: Vec<i64> = labels.into_data().iter::<i64>().collect();
        topk_accuracy(&logits, &labels, classes, topk)
    }

    pub fn loss(&self, input: Tensor<Inner<B>, 4>, label: Tensor<Inner<B>, 1, Int>) -> Tensor<Inner<B>, 1> {
        self.criterion.loss(self.get_logits(input), label)
    }

    // ── Checkpoints ───────────────────────────────────────────────────────────

    /// Save the whole network, or only the classifier when `features` is false.
    pub fn save(&self, target: &CheckpointTarget, features: bool) -> Result<PathBuf> {
        let path = target.resolve(&self.store);
        if features {
            self.store.save_module::<B, _>(&self.network, &path)?;
        } else {
            self.store.save_module::<B, _>(&self.network.classifier, &path)?;
        }
        if self.verbose {
            tracing::info!("Model {} saved at: {}", self.name, path.display());
        }
        Ok(path)
    }

    /// Load parameters saved by [`save`](Self::save) onto `device` (primary
    /// device by default), which becomes the primary device. The network is
    /// unchanged if this fails.
    pub fn load(&mut self, target: &CheckpointTarget, features: bool, device: Option<&B::Device>) -> Result<PathBuf> {
        let path   = target.resolve(&self.store);
        let device = device.unwrap_or(&self.devices[0]).clone();
        self.load_from(&path, features, &device)?;
        if device != self.devices[0] {
            self.to_device(&device);
        }
        Ok(path)
    }

    /// Load the family's bundled pretrained weights.
    pub fn load_official(&mut self) -> Result<PathBuf> {
        let Some(path) = self.family.official_weights.clone() else {
            return Err(ModelError::NotImplemented(format!(
                "no official weights for model family '{}'",
                self.family.name
            )));
        };
        let device = self.devices[0].clone();
        self.load_from(&path, true, &device)?;
        Ok(path)
    }

    fn load_from(&mut self, path: &Path, features: bool, device: &B::Device) -> Result<()> {
        if features {
            self.network = self.store.load_module::<B, _>(&self.network, path, device)?;
        } else {
            let classifier = self.store.load_module::<B, _>(&self.network.classifier, path, device)?;
            self.network.classifier = classifier;
        }
        self.sync_parallel();
        if self.verbose {
            tracing::info!("Model {} loaded from: {}", self.name, path.display());
        }
        Ok(())
    }

    // ── Summary ───────────────────────────────────────────────────────────────

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<16}{}", "model", self.name);
        let _ = writeln!(out, "{:<16}{}", "family", self.family.name);
        let _ = writeln!(out, "{:<16}{:?}", "suffix", self.store.suffix());
        let _ = writeln!(out, "{:<16}{}", "folder", self.store.folder().display());
        if let Some(d) = &self.dataset {
            let _ = writeln!(out, "{:<16}{} ({})", "dataset", d.name, d.data_type);
        }
        let _ = writeln!(out, "{:<16}{}", "num_classes", self.num_classes);
        let _ = writeln!(out, "{:<16}{}", "loss_weights", self.criterion.weights().is_some());
        match self.smoothing {
            Some(s) => { let _ = writeln!(out, "{:<16}sigma={} n={}", "smoothing", s.sigma, s.n); }
            None    => { let _ = writeln!(out, "{:<16}off", "smoothing"); }
        }
        match self.sgm_gamma {
            Some(g) => { let _ = writeln!(out, "{:<16}gamma={g}", "sgm"); }
            None    => { let _ = writeln!(out, "{:<16}off", "sgm"); }
        }
        let _ = writeln!(out, "{:<16}{}", "parallel", self.parallel.as_ref().map_or(1, ParallelView::num_replicas));
        let _ = writeln!(out, "{:<16}{}", "parameters", self.network.num_params());
        let _ = writeln!(out, "{:<16}{}", "conv_depth", self.network_config.conv_depth);
        let _ = writeln!(out, "{:<16}{}", "conv_dim", self.network_config.conv_dim);
        let _ = write!(
            out,
            "{:<16}depth {}: {}",
            "classifier",
            self.network.classifier.depth(),
            self.network.classifier.layer_names().join(", "),
        );
        out
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Mean logits over `n` Gaussian-perturbed copies of `input`; one plain pass
/// without smoothing. Zero sigma adds no noise.
fn smoothed_logits<I: Backend>(
    forward:   impl Fn(Tensor<I, 4>) -> Tensor<I, 2>,
    input:     Tensor<I, 4>,
    smoothing: Option<Smoothing>,
) -> Tensor<I, 2> {
    let Some(s) = smoothing.filter(|s| s.n > 0) else {
        return forward(input);
    };

    let perturb = |x: &Tensor<I, 4>| {
        if s.sigma > 0.0 {
            x.clone() + Tensor::random(x.shape(), Distribution::Normal(0.0, s.sigma), &x.device())
        } else {
            x.clone()
        }
    };

    let mut total = forward(perturb(&input));
    for _ in 1..s.n {
        total = total + forward(perturb(&input));
    }
    total.div_scalar(s.n as f64)
}

/// Most frequent value; the smallest wins a tie.
fn most_common(values: &[i64]) -> i64 {
    let mut counts = BTreeMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0usize) += 1;
    }
    let mut best = (0, 0usize);
    for (value, count) in counts {
        if count > best.1 {
            best = (value, count);
        }
    }
    best.0
}
