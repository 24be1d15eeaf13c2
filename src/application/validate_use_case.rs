// ============================================================
// Layer 2 — ValidateUseCase / SummaryUseCase
// ============================================================
// Validate: rebuild a trained model from its saved config and
// checkpoint, regenerate the same validation split, and score it.
//
//   {model_dir}/image/{dataset}/
//     train_config.json   ← read first, rebuilds the architecture
//     {name}{suffix}.pth  ← then loaded into it
//
// Summary: build a wrapper without loading anything and render
// its parameters.

use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::data::dataloader::DataLoaderBuilder;

use crate::application::{
    backend::{AppBackend, AppInnerBackend},
    train_use_case::TrainConfig,
};
use crate::data::{
    batcher::{ImageBatchData, ImageBatcher},
    dataset::ImageDataset,
    splitter::split_train_val,
};
use crate::infra::{checkpoint::CheckpointStore, env::Env};
use crate::ml::{
    trainer::ValidationResult,
    wrapper::{CheckpointTarget, ModelWrapper, Smoothing, WrapperConfig},
};

#[derive(Debug, Clone)]
pub struct ValidateConfig {
    pub model_dir: PathBuf,
    pub dataset:   String,
    /// Checkpoint to load instead of the one named by the saved config.
    pub file_path: Option<PathBuf>,
    /// Override the saved smoothing setting for this run.
    pub smoothing: Option<Smoothing>,
    pub verbose:   bool,
}

pub struct ValidateUseCase {
    config: ValidateConfig,
}

impl ValidateUseCase {
    pub fn new(config: ValidateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ValidationResult> {
        let cfg    = &self.config;
        let folder = cfg.model_dir.join("image").join(&cfg.dataset);

        // ── Step 1: rebuild the training config ───────────────────────────────
        let train_cfg: TrainConfig = CheckpointStore::new(&folder, "", "").load_config()?;

        // ── Step 2: rebuild the wrapper and load its weights ──────────────────
        let env = Env::<AppBackend>::new(Vec::new())
            .with_model_dir(&cfg.model_dir)
            .with_verbose(cfg.verbose)
            .with_seed(train_cfg.data.seed)
            .init();
        let mut model_cfg = train_cfg.wrapper_config();
        model_cfg.pretrain = cfg.file_path.is_none();
        if let Some(s) = cfg.smoothing {
            model_cfg.randomized_smooth = true;
            model_cfg.rs_sigma          = s.sigma;
            model_cfg.rs_n              = s.n;
        }

        let mut wrapper = ModelWrapper::new(&model_cfg, Some(train_cfg.dataset_info().into()), &env)
            .with_context(|| format!("Cannot restore model '{}' from '{}'", model_cfg.name, folder.display()))?;
        if let Some(path) = &cfg.file_path {
            wrapper.load(&CheckpointTarget::file(path), true, None)?;
        }

        // ── Step 3: same validation split as training ─────────────────────────
        let samples    = train_cfg.data.generate();
        let (_, val)   = split_train_val(samples, train_cfg.train_fraction, train_cfg.data.seed);
        let shape      = train_cfg.data.shape();
        let val_loader = DataLoaderBuilder::new(ImageBatcher::<AppInnerBackend>::new(env.device().clone(), shape))
            .batch_size(train_cfg.batch_size)
            .num_workers(1)
            .build(ImageDataset::new(val, shape)?);

        // ── Step 4: validate ──────────────────────────────────────────────────
        let criterion = wrapper.criterion().clone();
        Ok(wrapper.validate(val_loader.as_ref(), &ImageBatchData, &criterion, cfg.verbose, "Validate"))
    }
}

// ─── SummaryUseCase ──────────────────────────────────────────────────────────

pub struct SummaryUseCase {
    config: WrapperConfig,
}

impl SummaryUseCase {
    pub fn new(config: WrapperConfig) -> Self {
        Self { config }
    }

    pub fn render(&self) -> Result<String> {
        let env     = Env::<AppBackend>::default();
        let wrapper = ModelWrapper::new(&self.config, None, &env)
            .with_context(|| format!("Cannot build model '{}'", self.config.name))?;
        Ok(wrapper.summary())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::application::train_use_case::TrainUseCase;
    use crate::data::synthetic::SyntheticConfig;
    use crate::ml::trainer::TrainOptions;
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn validate_logged(dir: &std::path::Path, verbose: bool) -> (ValidationResult, String) {
        let logs       = Captured::default();
        let subscriber = tracing_subscriber::fmt().with_writer(logs.clone()).with_ansi(false).finish();
        let result     = tracing::subscriber::with_default(subscriber, || {
            ValidateUseCase::new(ValidateConfig {
                model_dir: dir.to_path_buf(),
                dataset:   "synthetic".into(),
                file_path: None,
                smoothing: None,
                verbose,
            })
            .execute()
            .unwrap()
        });
        (result, logs.text())
    }

    #[test]
    fn test_validate_reproduces_training_accuracy() {
        let dir = tempfile::tempdir().unwrap();
        // tight clusters: the net separates them fully, so some epoch ties or beats the baseline
        let cfg = TrainConfig {
            data:       SyntheticConfig { samples: 96, jitter: 0.5, seed: 3, ..Default::default() },
            training:   TrainOptions { epochs: 5, validate_interval: 1, verbose: false, save: true, ..Default::default() },
            model_dir:  dir.path().to_path_buf(),
            batch_size: 16,
            ..Default::default()
        };
        let report = TrainUseCase::new(cfg).execute().unwrap();

        assert!(report.checkpoints_written >= 1);
        assert!(dir.path().join("image").join("synthetic").join("net.pth").exists());

        let (result, _) = validate_logged(dir.path(), false);
        assert!((result.top1 - report.best_acc).abs() < 1e-9);
    }

    #[test]
    fn test_validate_respects_verbosity() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            data:       SyntheticConfig { samples: 96, jitter: 0.5, seed: 4, ..Default::default() },
            training:   TrainOptions { epochs: 5, validate_interval: 1, verbose: false, save: true, ..Default::default() },
            model_dir:  dir.path().to_path_buf(),
            batch_size: 16,
            ..Default::default()
        };
        TrainUseCase::new(cfg).execute().unwrap();

        let (quiet, quiet_logs) = validate_logged(dir.path(), false);
        assert!(!quiet_logs.contains("Acc@1"), "{quiet_logs}");

        let (loud, loud_logs) = validate_logged(dir.path(), true);
        assert!(loud_logs.contains("Acc@1"), "{loud_logs}");
        assert_eq!(quiet, loud);
    }

    #[test]
    fn test_validate_without_training_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = ValidateUseCase::new(ValidateConfig {
            model_dir: dir.path().to_path_buf(),
            dataset:   "synthetic".into(),
            file_path: None,
            smoothing: None,
            verbose:   false,
        })
        .execute()
        .unwrap_err();
        assert!(err.to_string().contains("train_config.json"));
    }

    #[test]
    fn test_summary_renders_model() {
        let cfg = WrapperConfig { num_classes: Some(10), ..WrapperConfig::new("convnet2") };
        let out = SummaryUseCase::new(cfg).render().unwrap();
        assert!(out.contains("convnet2"));
        assert!(out.contains("fc1, fc2"));
    }
}
