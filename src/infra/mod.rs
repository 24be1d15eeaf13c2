// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   checkpoint.rs — {folder}/{name}{suffix}.pth parameter files
//                   and train_config.json
//   metrics.rs    — meters, top-k accuracy, best tracking and
//                   the per-epoch metrics CSV
//   env.rs        — devices, verbosity, directories, seed

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Process-wide environment context
pub mod env;

/// Metric accumulators and CSV logging
pub mod metrics;
