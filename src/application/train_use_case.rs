// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Generate samples          (Layer 4 - data)
//   Step 2: Split train/validation    (Layer 4 - data)
//   Step 3: Build datasets            (Layer 4 - data)
//   Step 4: Build the model wrapper   (Layer 5 - ml)
//   Step 5: Save config               (Layer 6 - infra)
//   Step 6: Build data loaders        (Layer 4 - data)
//   Step 7: Build optimizer/schedule  (Layer 5 - ml)
//   Step 8: Run training loop         (Layer 5 - ml)

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::data::dataloader::DataLoaderBuilder;
use serde::{Deserialize, Serialize};

use crate::application::backend::{AppBackend, AppInnerBackend};
use crate::data::{
    batcher::{ImageBatchData, ImageBatcher},
    dataset::ImageDataset,
    splitter::split_train_val,
    synthetic::SyntheticConfig,
};
use crate::domain::dataset::DatasetInfo;
use crate::infra::{env::Env, metrics::MetricsLogger};
use crate::ml::{
    optim::{define_optimizer, OptimizerConfig},
    trainer::{TrainData, TrainHooks, TrainOptions, TrainReport},
    wrapper::{ModelWrapper, WrapperConfig},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything needed to repeat a run. Saved as train_config.json
// next to the checkpoint so `validate` can rebuild the model and
// the same validation split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub model:          WrapperConfig,
    pub dataset:        String,
    pub data:           SyntheticConfig,
    pub train_fraction: f64,
    pub batch_size:     usize,
    pub optimizer:      OptimizerConfig,
    pub training:       TrainOptions,
    pub model_dir:      PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model:          WrapperConfig { in_channels: 2, ..WrapperConfig::new("net") },
            dataset:        "synthetic".to_string(),
            data:           SyntheticConfig::default(),
            train_fraction: 0.8,
            batch_size:     32,
            optimizer:      OptimizerConfig { lr: 0.01, ..Default::default() },
            training:       TrainOptions { save: true, ..Default::default() },
            model_dir:      PathBuf::from("data/model"),
        }
    }
}

impl TrainConfig {
    /// The dataset descriptor the wrapper is built against.
    pub fn dataset_info(&self) -> DatasetInfo {
        DatasetInfo::new(&self.dataset, "image", self.data.num_classes)
    }

    /// The model config with the input width taken from the data.
    pub fn wrapper_config(&self) -> WrapperConfig {
        WrapperConfig { in_channels: self.data.channels, ..self.model.clone() }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;
        let env = Env::<AppBackend>::new(Vec::new())
            .with_model_dir(&cfg.model_dir)
            .with_verbose(cfg.training.verbose)
            .with_seed(cfg.data.seed)
            .init();

        // ── Steps 1-3: samples, split, datasets ──────────────────────────────
        let samples      = cfg.data.generate();
        let (train, val) = split_train_val(samples, cfg.train_fraction, cfg.data.seed);
        tracing::info!("Split: {} train, {} validation", train.len(), val.len());

        let shape      = cfg.data.shape();
        let train_data = ImageDataset::new(train, shape)?;
        let val_data   = ImageDataset::new(val, shape)?;
        tracing::info!("Train class counts: {:?}", train_data.class_counts(cfg.data.num_classes));

        // ── Step 4: model wrapper ─────────────────────────────────────────────
        let mut wrapper = ModelWrapper::new(&cfg.wrapper_config(), Some(cfg.dataset_info().into()), &env)
            .with_context(|| format!("Cannot build model '{}'", cfg.model.name))?;
        tracing::info!("Model '{}' with checkpoints in '{}'", wrapper.name(), wrapper.folder_path().display());

        // ── Step 5: save config for validate ──────────────────────────────────
        wrapper.store().save_config(cfg)?;

        // ── Step 6: data loaders ──────────────────────────────────────────────
        let train_loader = DataLoaderBuilder::new(ImageBatcher::<AppBackend>::new(env.device().clone(), shape))
            .batch_size(cfg.batch_size)
            .shuffle(cfg.data.seed)
            .num_workers(1)
            .build(train_data);
        let val_loader = DataLoaderBuilder::new(ImageBatcher::<AppInnerBackend>::new(env.device().clone(), shape))
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .build(val_data);

        // ── Step 7: optimizer ─────────────────────────────────────────────────
        let (mut optim, mut schedule) = define_optimizer::<AppBackend>(&cfg.optimizer)?;

        // ── Step 8: training loop (Layer 5) ───────────────────────────────────
        let logger    = MetricsLogger::new(wrapper.folder_path())?;
        let criterion = wrapper.criterion().clone();
        let data      = TrainData {
            train:    train_loader.as_ref(),
            valid:    val_loader.as_ref(),
            get_data: &ImageBatchData,
            loss_fn:  &criterion,
        };
        let hooks = TrainHooks { logger: Some(&logger), ..Default::default() };

        wrapper.train(&mut optim, schedule.as_mut(), &cfg.training, &data, hooks)
    }
}
