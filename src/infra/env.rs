// ============================================================
// Layer 6 — Environment Context
// ============================================================
// Process-wide settings that used to live in a global: which
// compute devices are available, how chatty to be, where
// checkpoints live, and the backend seed.
//
// Build one with `Env::new(..)` at start-up, call `init()` once,
// then pass a reference into the model wrapper and the training
// calls. Dropping it is the teardown.

use std::path::PathBuf;

use burn::prelude::*;

#[derive(Debug, Clone)]
pub struct Env<B: Backend> {
    /// First entry is the primary device; more entries enable
    /// data-parallel inference for families that support it.
    pub devices:   Vec<B::Device>,
    pub verbose:   bool,
    pub model_dir: PathBuf,
    pub seed:      Option<u64>,
}

impl<B: Backend> Env<B> {
    pub fn new(devices: Vec<B::Device>) -> Self {
        let devices = if devices.is_empty() { vec![B::Device::default()] } else { devices };
        Self {
            devices,
            verbose:   false,
            model_dir: PathBuf::from("data/model"),
            seed:      None,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// One-time initialisation: seeds the backend RNG.
    pub fn init(self) -> Self {
        if let Some(seed) = self.seed {
            B::seed(seed);
        }
        tracing::info!(
            "Environment ready: {} device(s), primary {:?}, model_dir '{}'",
            self.devices.len(),
            self.device(),
            self.model_dir.display(),
        );
        self
    }

    pub fn device(&self) -> &B::Device {
        &self.devices[0]
    }

    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }
}

impl<B: Backend> Default for Env<B> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_empty_device_list_falls_back_to_default() {
        let env = Env::<NdArray>::new(Vec::new());
        assert_eq!(env.num_devices(), 1);
    }

    #[test]
    fn test_builder_settings() {
        let env = Env::<NdArray>::default()
            .with_verbose(true)
            .with_model_dir("/tmp/models")
            .with_seed(7);
        assert!(env.verbose);
        assert_eq!(env.model_dir, PathBuf::from("/tmp/models"));
        assert_eq!(env.seed, Some(7));
    }
}
