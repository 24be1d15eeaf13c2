// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Dataset pipelines are external collaborators. The core only
// programs against this descriptor, so any dataset crate can
// hand its metadata to the model wrapper.

// ─── DatasetDescriptor ───────────────────────────────────────────────────────
/// Metadata the model wrapper reads from a dataset.
///
/// Implementations:
///   - DatasetInfo → plain resolved record
pub trait DatasetDescriptor {
    fn name(&self) -> &str;

    /// Data modality. Only "image" datasets are replicated across devices.
    fn data_type(&self) -> &str;

    fn num_classes(&self) -> usize;

    /// Per-class cross-entropy weights, if the dataset is imbalanced.
    fn loss_weights(&self) -> Option<&[f32]>;
}
