// ============================================================
// Layer 3 — Dataset Descriptor
// ============================================================
// The model wrapper never owns a dataset. It only needs to know
// a few facts about it: its name and data modality (for the
// checkpoint folder and the data-parallel decision), the number
// of classes, and optional per-class loss weights.

use serde::{Deserialize, Serialize};

use crate::domain::traits::DatasetDescriptor;

/// A resolved description of a classification dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name:         String,
    /// Data modality, e.g. "image"
    pub data_type:    String,
    pub num_classes:  usize,
    pub loss_weights: Option<Vec<f32>>,
}

impl DatasetInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, num_classes: usize) -> Self {
        Self {
            name:         name.into(),
            data_type:    data_type.into(),
            num_classes,
            loss_weights: None,
        }
    }

    pub fn with_loss_weights(mut self, weights: Vec<f32>) -> Self {
        self.loss_weights = Some(weights);
        self
    }
}

impl DatasetDescriptor for DatasetInfo {
    fn name(&self) -> &str { &self.name }

    fn data_type(&self) -> &str { &self.data_type }

    fn num_classes(&self) -> usize { self.num_classes }

    fn loss_weights(&self) -> Option<&[f32]> { self.loss_weights.as_deref() }
}

/// How a dataset reaches the model wrapper.
///
/// Configuration layers frequently carry only the dataset *name*.
/// The wrapper rejects that form: the name has to be resolved into
/// a [`DatasetInfo`] first.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetRef {
    Resolved(DatasetInfo),
    Name(String),
}

impl From<DatasetInfo> for DatasetRef {
    fn from(info: DatasetInfo) -> Self {
        DatasetRef::Resolved(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_accessors() {
        let info = DatasetInfo::new("cifar10", "image", 10).with_loss_weights(vec![1.0; 10]);
        assert_eq!(info.name(), "cifar10");
        assert_eq!(info.data_type(), "image");
        assert_eq!(info.num_classes(), 10);
        assert_eq!(info.loss_weights().map(|w| w.len()), Some(10));
    }

    #[test]
    fn test_from_info_is_resolved() {
        let r: DatasetRef = DatasetInfo::new("mnist", "image", 10).into();
        assert!(matches!(r, DatasetRef::Resolved(_)));
    }
}
