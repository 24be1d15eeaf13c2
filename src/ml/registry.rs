// ============================================================
// Layer 5 — Network Family Registry
// ============================================================
// Maps a model name to the family that builds it. A family
// knows its default architecture and its capabilities:
//
//   supports_data_parallel — may be replicated across devices
//   official_weights       — bundled pretrained checkpoint, if any
//
// Names may carry a trailing layer number ("convnet4"), which
// the family applies to its depth parameter.

use std::path::PathBuf;

use crate::error::{ModelError, Result};
use crate::ml::network::NetworkConfig;

/// Builds a family's architecture from (num_classes, in_channels, layer).
pub type ConfigFn = fn(usize, usize, Option<usize>) -> NetworkConfig;

#[derive(Debug, Clone)]
pub struct ModelFamily {
    pub name:                   &'static str,
    pub supports_data_parallel: bool,
    pub official_weights:       Option<PathBuf>,
    build:                      ConfigFn,
}

impl ModelFamily {
    pub fn new(name: &'static str, supports_data_parallel: bool, build: ConfigFn) -> Self {
        Self { name, supports_data_parallel, official_weights: None, build }
    }

    pub fn with_official_weights(mut self, path: impl Into<PathBuf>) -> Self {
        self.official_weights = Some(path.into());
        self
    }

    pub fn config(&self, num_classes: usize, in_channels: usize, layer: Option<usize>) -> NetworkConfig {
        (self.build)(num_classes, in_channels, layer)
    }
}

// ─── Built-in families ───────────────────────────────────────────────────────

/// Identity features and a single linear layer: multinomial logistic regression
/// on per-channel means.
fn net_config(num_classes: usize, in_channels: usize, layer: Option<usize>) -> NetworkConfig {
    NetworkConfig::new(num_classes)
        .with_in_channels(in_channels)
        .with_conv_dim(in_channels)
        .with_fc_depth(layer.unwrap_or(1))
        .with_fc_dim(64)
}

/// Identity features with a deeper fully-connected head.
fn mlp_config(num_classes: usize, in_channels: usize, layer: Option<usize>) -> NetworkConfig {
    NetworkConfig::new(num_classes)
        .with_in_channels(in_channels)
        .with_conv_dim(in_channels)
        .with_fc_depth(layer.unwrap_or(3))
        .with_fc_dim(256)
}

fn convnet_config(num_classes: usize, in_channels: usize, layer: Option<usize>) -> NetworkConfig {
    NetworkConfig::new(num_classes)
        .with_in_channels(in_channels)
        .with_conv_depth(layer.unwrap_or(3))
        .with_conv_dim(64)
        .with_fc_depth(2)
        .with_fc_dim(256)
}

/// Splits a trailing layer number off a model name: "convnet4" → ("convnet", Some(4)).
pub fn split_name(name: &str) -> (String, Option<usize>) {
    let name  = name.trim().to_lowercase();
    let stem  = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let layer = name[stem.len()..].parse::<usize>().ok();
    (stem.to_string(), layer)
}

#[derive(Debug, Clone)]
pub struct Registry {
    families: Vec<ModelFamily>,
}

impl Registry {
    pub fn builtin() -> Self {
        Self {
            families: vec![
                ModelFamily::new("net", false, net_config),
                ModelFamily::new("mlp", true, mlp_config),
                ModelFamily::new("convnet", true, convnet_config),
            ],
        }
    }

    /// Add or replace a family.
    pub fn register(&mut self, family: ModelFamily) {
        self.families.retain(|f| f.name != family.name);
        self.families.push(family);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.families.iter().map(|f| f.name).collect()
    }

    /// Resolve a (possibly layer-suffixed) model name.
    pub fn lookup(&self, name: &str) -> Result<(&ModelFamily, Option<usize>)> {
        let (stem, layer) = split_name(name);
        self.families
            .iter()
            .find(|f| f.name == stem)
            .map(|f| (f, layer))
            .ok_or_else(|| ModelError::NotImplemented(format!("unknown model family '{name}'")))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
