// ============================================================
// Layer 5 — Raw Network
// ============================================================
// An image classifier is always the same composition:
//
//   input [batch, C, H, W]
//     │  features    (stack of conv blocks, or identity)
//     ▼
//   feature map [batch, conv_dim, H', W']
//     │  pool        (adaptive average → 1×1)
//     │  flatten
//     ▼
//   embedding [batch, conv_dim]
//     │  classifier  (0..n fully-connected layers)
//     ▼
//   logits [batch, num_classes]
//
// Classifier layers are addressed by name: a single layer is
// `fc`, a deeper head is `fc1 … fcN`. Fine-tuning and attack
// code relies on these names, so they must not change.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig,
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::error::ModelError;

// ─── ImageNetwork ─────────────────────────────────────────────────────────────
/// What the model wrapper and attacks need from any network family.
pub trait ImageNetwork<B: Backend> {
    /// input [batch, C, H, W] → logits [batch, num_classes]
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Output of the feature extractor only.
    fn feature_map(&self, x: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Pooled, flattened features fed to the classifier.
    fn embedding(&self, x: Tensor<B, 4>) -> Tensor<B, 2>;

    fn classifier(&self) -> &Classifier<B>;

    /// Skip-gradient reweighting only affects networks with residual paths.
    fn has_skip_connections(&self) -> bool {
        false
    }
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct NetworkConfig {
    pub num_classes: usize,
    #[config(default = 3)]
    pub in_channels: usize,
    /// Number of conv blocks; 0 makes the feature extractor the identity.
    #[config(default = 0)]
    pub conv_depth:  usize,
    /// Channels leaving the feature extractor = classifier input width.
    #[config(default = 3)]
    pub conv_dim:    usize,
    /// Number of linear layers; 0 makes the classifier the identity.
    #[config(default = 1)]
    pub fc_depth:    usize,
    /// Hidden width when fc_depth > 1.
    #[config(default = 0)]
    pub fc_dim:      usize,
    #[config(default = 0.5)]
    pub dropout:     f64,
}

impl NetworkConfig {
    /// Reject configurations whose stages would not line up.
    pub fn check(&self) -> crate::error::Result<()> {
        if self.num_classes == 0 {
            return Err(ModelError::InvalidConfig("num_classes must be at least 1".into()));
        }
        if self.conv_dim == 0 {
            return Err(ModelError::InvalidConfig("conv_dim must be at least 1".into()));
        }
        if self.conv_depth == 0 && self.conv_dim != self.in_channels {
            return Err(ModelError::InvalidConfig(format!(
                "identity features keep {} channels but conv_dim is {}",
                self.in_channels, self.conv_dim
            )));
        }
        if self.fc_depth == 0 && self.conv_dim != self.num_classes {
            return Err(ModelError::InvalidConfig(format!(
                "identity classifier emits {} logits but num_classes is {}",
                self.conv_dim, self.num_classes
            )));
        }
        if self.fc_depth > 1 && self.fc_dim == 0 {
            return Err(ModelError::InvalidConfig(format!(
                "fc_depth {} needs a hidden width fc_dim > 0",
                self.fc_depth
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidConfig(format!("dropout {} outside [0, 1)", self.dropout)));
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Network<B> {
        Network {
            features:    self.build_features(device),
            pool:        AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            classifier:  self.build_classifier(device),
            num_classes: self.num_classes,
            conv_dim:    self.conv_dim,
        }
    }

    fn build_features<B: Backend>(&self, device: &B::Device) -> Features<B> {
        let blocks = (0..self.conv_depth)
            .map(|i| {
                let channels_in = if i == 0 { self.in_channels } else { self.conv_dim };
                ConvBlock {
                    conv: Conv2dConfig::new([channels_in, self.conv_dim], [3, 3])
                        .with_padding(PaddingConfig2d::Same)
                        .init(device),
                    norm:       BatchNormConfig::new(self.conv_dim).init(device),
                    activation: Relu::new(),
                }
            })
            .collect();
        Features { blocks }
    }

    fn build_classifier<B: Backend>(&self, device: &B::Device) -> Classifier<B> {
        let layers = match self.fc_depth {
            0 => Vec::new(),
            1 => vec![LinearConfig::new(self.conv_dim, self.num_classes).init(device)],
            n => {
                let mut layers = Vec::with_capacity(n);
                layers.push(LinearConfig::new(self.conv_dim, self.fc_dim).init(device));
                for _ in 0..n - 2 {
                    layers.push(LinearConfig::new(self.fc_dim, self.fc_dim).init(device));
                }
                layers.push(LinearConfig::new(self.fc_dim, self.num_classes).init(device));
                layers
            }
        };
        Classifier {
            layers,
            activation: Relu::new(),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }
}

// ─── Feature extractor ───────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv:       Conv2d<B>,
    pub norm:       BatchNorm<B, 2>,
    pub activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.activation.forward(self.norm.forward(self.conv.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct Features<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
}

impl<B: Backend> Features<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }

    pub fn is_identity(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    pub layers:     Vec<Linear<B>>,
    pub activation: Relu,
    pub dropout:    Dropout,
}

impl<B: Backend> Classifier<B> {
    /// ReLU + dropout follow every layer except the last.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len().saturating_sub(1);
        let mut x = x;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            if i < last {
                x = self.dropout.forward(self.activation.forward(x));
            }
        }
        x
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// `fc` for a single layer, `fc1 … fcN` otherwise.
    pub fn layer_names(&self) -> Vec<String> {
        match self.layers.len() {
            0 => Vec::new(),
            1 => vec!["fc".to_string()],
            n => (1..=n).map(|i| format!("fc{i}")).collect(),
        }
    }

    pub fn layer(&self, name: &str) -> Option<&Linear<B>> {
        let index = self.layer_names().iter().position(|n| n == name)?;
        self.layers.get(index)
    }
}

// ─── Network ─────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Network<B: Backend> {
    pub features:    Features<B>,
    pub pool:        AdaptiveAvgPool2d,
    pub classifier:  Classifier<B>,
    pub num_classes: usize,
    pub conv_dim:    usize,
}

impl<B: Backend> ImageNetwork<B> for Network<B> {
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.classifier.forward(self.embedding(x))
    }

    fn feature_map(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.features.forward(x)
    }

    fn embedding(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(self.feature_map(x)); // [batch, conv_dim, 1, 1]
        x.flatten::<2>(1, 3)
    }

    fn classifier(&self) -> &Classifier<B> {
        &self.classifier
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_zero_depth_classifier_is_identity() {
        let device = Default::default();
        let net: Network<TestBackend> = NetworkConfig::new(4)
            .with_in_channels(4)
            .with_conv_dim(4)
            .with_fc_depth(0)
            .init(&device);

        let x = Tensor::<TestBackend, 2>::random([3, 4], Distribution::Default, &device);
        assert_eq!(values(net.classifier.forward(x.clone())), values(x));
        assert!(net.classifier.layer_names().is_empty());
    }

    #[test]
    fn test_single_layer_classifier_shapes() {
        let device = Default::default();
        let net: Network<TestBackend> = NetworkConfig::new(10)
            .with_in_channels(3)
            .with_conv_depth(1)
            .with_conv_dim(16)
            .init(&device);

        assert_eq!(net.classifier.layer_names(), vec!["fc".to_string()]);
        let fc = net.classifier.layer("fc").unwrap();
        // burn stores linear weights as [d_input, d_output]
        assert_eq!(fc.weight.val().dims(), [16, 10]);
        assert_eq!(fc.bias.as_ref().unwrap().val().dims(), [10]);
    }

    #[test]
    fn test_deep_classifier_naming_and_widths() {
        let device = Default::default();
        let net: Network<TestBackend> = NetworkConfig::new(5)
            .with_in_channels(8)
            .with_conv_dim(8)
            .with_fc_depth(3)
            .with_fc_dim(32)
            .init(&device);

        let names = net.classifier.layer_names();
        assert_eq!(names, vec!["fc1", "fc2", "fc3"]);
        assert_eq!(net.classifier.layer("fc1").unwrap().weight.val().dims(), [8, 32]);
        assert_eq!(net.classifier.layer("fc2").unwrap().weight.val().dims(), [32, 32]);
        assert_eq!(net.classifier.layer("fc3").unwrap().weight.val().dims(), [32, 5]);
        assert!(net.classifier.layer("fc").is_none());
    }

    #[test]
    fn test_forward_and_intermediate_shapes() {
        let device = Default::default();
        let net: Network<TestBackend> = NetworkConfig::new(7)
            .with_in_channels(3)
            .with_conv_depth(2)
            .with_conv_dim(6)
            .with_fc_depth(2)
            .with_fc_dim(12)
            .init(&device);

        let x = Tensor::<TestBackend, 4>::random([2, 3, 8, 8], Distribution::Default, &device);
        assert_eq!(net.feature_map(x.clone()).dims(), [2, 6, 8, 8]);
        assert_eq!(net.embedding(x.clone()).dims(), [2, 6]);
        assert_eq!(net.forward(x).dims(), [2, 7]);
    }

    #[test]
    fn test_identity_features_pool_channels() {
        let device = Default::default();
        let net: Network<TestBackend> = NetworkConfig::new(2)
            .with_in_channels(2)
            .with_conv_dim(2)
            .init(&device);

        let x = Tensor::<TestBackend, 4>::from_floats([[[[1.0, 3.0]], [[2.0, 4.0]]]], &device);
        assert!(net.features.is_identity());
        assert_eq!(values(net.embedding(x)), vec![2.0, 3.0]);
    }

    #[test]
    fn test_check_rejects_mismatched_identity_features() {
        let cfg = NetworkConfig::new(10).with_in_channels(3).with_conv_dim(64);
        assert!(matches!(cfg.check(), Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn test_check_rejects_identity_classifier_of_wrong_width() {
        let cfg = NetworkConfig::new(2).with_in_channels(3).with_conv_dim(3).with_fc_depth(0);
        assert!(matches!(cfg.check(), Err(ModelError::InvalidConfig(_))));
        assert!(NetworkConfig { num_classes: 3, ..cfg }.check().is_ok());
    }

    #[test]
    fn test_check_rejects_missing_hidden_width() {
        let cfg = NetworkConfig::new(10)
            .with_in_channels(3)
            .with_conv_dim(3)
            .with_fc_depth(2);
        assert!(cfg.check().is_err());
        assert!(cfg.with_fc_dim(16).check().is_ok());
    }
}
