// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From samples in memory to tensor batches:
//
//   ImageSample list (synthetic or loaded)
//       │
//       ▼
//   split_train_val   → seeded shuffle, train / validation
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   ImageBatcher      → stacks samples into [N, C, H, W] + labels
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop

/// Implements Burn's Dataset trait for image samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;

/// Linearly separable toy images
pub mod synthetic;
