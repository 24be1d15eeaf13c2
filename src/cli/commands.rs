// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands: `train`, `validate` and `summary`, with
// their flags. Each Args struct converts into the matching
// application config with a From impl, so the application
// layer never sees clap types.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    train_use_case::TrainConfig,
    validate_use_case::ValidateConfig,
};
use crate::data::synthetic::SyntheticConfig;
use crate::ml::{
    optim::OptimizerConfig,
    trainer::TrainOptions,
    wrapper::{Smoothing, WrapperConfig},
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a classifier on synthetic image data
    Train(TrainArgs),

    /// Re-validate a trained checkpoint
    Validate(ValidateArgs),

    /// Print a model's configuration and layers
    Summary(SummaryArgs),
}

// ─── Shared model flags ──────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model family, optionally with a layer number (net, mlp, convnet3)
    #[arg(long, default_value = "net")]
    pub model: String,

    /// Appended to the model name in checkpoint file names
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Load the family's official pretrained weights
    #[arg(long)]
    pub official: bool,

    /// Load this model's own checkpoint before training
    #[arg(long)]
    pub pretrain: bool,

    /// Average logits over Gaussian-perturbed inputs
    #[arg(long)]
    pub randomized_smooth: bool,

    #[arg(long, default_value_t = 0.01)]
    pub rs_sigma: f64,

    #[arg(long, default_value_t = 100)]
    pub rs_n: usize,

    /// Skip-gradient method (only affects networks with skip connections)
    #[arg(long)]
    pub sgm: bool,

    #[arg(long, default_value_t = 1.0)]
    pub sgm_gamma: f64,
}

impl From<ModelArgs> for WrapperConfig {
    fn from(a: ModelArgs) -> Self {
        WrapperConfig {
            suffix:            a.suffix,
            official:          a.official,
            pretrain:          a.pretrain,
            randomized_smooth: a.randomized_smooth,
            rs_sigma:          a.rs_sigma,
            rs_n:              a.rs_n,
            sgm:               a.sgm,
            sgm_gamma:         a.sgm_gamma,
            ..WrapperConfig::new(a.model)
        }
    }
}

// ─── train ───────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Root folder for checkpoints: {model_dir}/image/{dataset}
    #[arg(long, default_value = "data/model")]
    pub model_dir: PathBuf,

    /// Name the synthetic dataset is saved under
    #[arg(long, default_value = "synthetic")]
    pub dataset: String,

    #[arg(long, default_value_t = 512)]
    pub samples: usize,

    #[arg(long, default_value_t = 2)]
    pub num_classes: usize,

    #[arg(long, default_value_t = 2)]
    pub channels: usize,

    #[arg(long, default_value_t = 1)]
    pub height: usize,

    #[arg(long, default_value_t = 1)]
    pub width: usize,

    /// Seed for data generation, the split and the backend
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Validate every N epochs (and after the last); 0 disables
    #[arg(long, default_value_t = 10)]
    pub validate_interval: usize,

    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// sgd, adam or adamw
    #[arg(long, default_value = "sgd")]
    pub optim: String,

    /// full, features, classifier (or partial)
    #[arg(long, default_value = "full")]
    pub parameters: String,

    #[arg(long)]
    pub momentum: Option<f64>,

    #[arg(long)]
    pub weight_decay: Option<f64>,

    #[arg(long)]
    pub nesterov: Option<bool>,

    /// Keep the learning rate constant
    #[arg(long)]
    pub no_lr_scheduler: bool,

    /// Decay the learning rate ×0.1 every N epochs
    #[arg(long, default_value_t = 30)]
    pub step_size: usize,

    /// Train with loss scaling
    #[arg(long)]
    pub amp: bool,

    /// Do not write a checkpoint on improvement
    #[arg(long)]
    pub no_save: bool,

    /// Write checkpoints to this exact file
    #[arg(long)]
    pub file_path: Option<PathBuf>,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data: SyntheticConfig {
                samples:     a.samples,
                num_classes: a.num_classes,
                channels:    a.channels,
                height:      a.height,
                width:       a.width,
                seed:        a.seed,
                ..Default::default()
            },
            model:          a.model.into(),
            dataset:        a.dataset,
            train_fraction: a.train_fraction,
            batch_size:     a.batch_size,
            optimizer: OptimizerConfig {
                lr:           a.lr,
                parameters:   a.parameters,
                optim_type:   a.optim,
                momentum:     a.momentum,
                weight_decay: a.weight_decay,
                nesterov:     a.nesterov,
                lr_scheduler: !a.no_lr_scheduler,
                step_size:    a.step_size,
            },
            training: TrainOptions {
                epochs:            a.epochs,
                validate_interval: a.validate_interval,
                save:              !a.no_save,
                amp:               a.amp,
                verbose:           true,
                file_path:         a.file_path,
                folder_path:       None,
                suffix:            None,
            },
            model_dir: a.model_dir,
        }
    }
}

// ─── validate ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long, default_value = "data/model")]
    pub model_dir: PathBuf,

    #[arg(long, default_value = "synthetic")]
    pub dataset: String,

    /// Checkpoint file to load instead of the default one
    #[arg(long)]
    pub file_path: Option<PathBuf>,

    /// Validate with randomized smoothing
    #[arg(long)]
    pub randomized_smooth: bool,

    #[arg(long, default_value_t = 0.01)]
    pub rs_sigma: f64,

    #[arg(long, default_value_t = 100)]
    pub rs_n: usize,
}

impl From<ValidateArgs> for ValidateConfig {
    fn from(a: ValidateArgs) -> Self {
        ValidateConfig {
            model_dir: a.model_dir,
            dataset:   a.dataset,
            file_path: a.file_path,
            smoothing: a.randomized_smooth.then_some(Smoothing { sigma: a.rs_sigma, n: a.rs_n }),
            verbose:   true,
        }
    }
}

// ─── summary ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[arg(long, default_value_t = 10)]
    pub num_classes: usize,

    #[arg(long, default_value_t = 3)]
    pub in_channels: usize,
}

impl From<SummaryArgs> for WrapperConfig {
    fn from(a: SummaryArgs) -> Self {
        WrapperConfig {
            num_classes: Some(a.num_classes),
            in_channels: a.in_channels,
            ..a.model.into()
        }
    }
}
