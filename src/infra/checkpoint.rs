// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores module parameters with Burn's named
// MessagePack recorder (full precision), so a checkpoint is a
// mapping from parameter name to tensor and nothing else.
//
// File naming convention:
//   {folder}/{name}{suffix}.pth     ← parameters (full or classifier-only)
//   {folder}/train_config.json      ← run configuration for rebuilding
//
// The recorder serialises to bytes and we write those bytes to
// exactly the resolved path; file recorders would swap the
// extension for their own.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use burn::{
    module::Module,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ModelError, Result};
use crate::ml::params::param_shapes;

type BytesRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Where a wrapper's checkpoints live: folder, model name and suffix.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    folder: PathBuf,
    name:   String,
    suffix: String,
}

impl CheckpointStore {
    pub fn new(folder: impl Into<PathBuf>, name: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self { folder: folder.into(), name: name.into(), suffix: suffix.into() }
    }

    pub fn folder(&self) -> &Path { &self.folder }

    pub fn name(&self) -> &str { &self.name }

    pub fn suffix(&self) -> &str { &self.suffix }

    /// `{folder}/{name}{suffix}.pth` with either part overridable.
    pub fn path_for(&self, folder: Option<&Path>, suffix: Option<&str>) -> PathBuf {
        let folder = folder.unwrap_or(&self.folder);
        let suffix = suffix.unwrap_or(&self.suffix);
        folder.join(format!("{}{}.pth", self.name, suffix))
    }

    pub fn default_path(&self) -> PathBuf {
        self.path_for(None, None)
    }

    /// Serialise `module`'s parameters to `path`, creating parent folders.
    pub fn save_module<B: Backend, M: Module<B>>(&self, module: &M, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let bytes = <BytesRecorder as Recorder<B>>::record(&BytesRecorder::default(), module.clone().into_record(), ())
            .map_err(|e| ModelError::CheckpointSave { path: path.to_path_buf(), reason: e.to_string() })?;
        fs::write(path, bytes)?;

        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(())
    }

    /// Load parameters from `path` into `module` on `device`.
    ///
    /// On any failure the error is returned and the caller's module is not
    /// touched: the record is applied to a clone, and the clone is only
    /// returned once its parameter shapes match the original.
    pub fn load_module<B: Backend, M: Module<B>>(&self, module: &M, path: &Path, device: &B::Device) -> Result<M> {
        if !path.exists() {
            return Err(ModelError::CheckpointNotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let record = <BytesRecorder as Recorder<B>>::load::<M::Record>(&BytesRecorder::default(), bytes, device)
            .map_err(|e| ModelError::CheckpointLoad { path: path.to_path_buf(), reason: e.to_string() })?;

        let expected = param_shapes::<B, M>(module);
        let loaded   = module.clone().load_record(record).to_device(device);
        let found    = param_shapes::<B, M>(&loaded);
        if expected != found {
            return Err(ModelError::CheckpointLoad {
                path:   path.to_path_buf(),
                reason: format!("parameter shapes {found:?} do not match the network's {expected:?}"),
            });
        }

        tracing::debug!("Loaded checkpoint '{}'", path.display());
        Ok(loaded)
    }

    /// Save a run configuration next to the checkpoints.
    pub fn save_config<T: Serialize>(&self, cfg: &T) -> anyhow::Result<()> {
        fs::create_dir_all(&self.folder)
            .with_context(|| format!("Cannot create '{}'", self.folder.display()))?;
        let path = self.folder.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        let path = self.folder.join("train_config.json");

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;

        Ok(serde_json::from_str(&json)?)
    }
}
