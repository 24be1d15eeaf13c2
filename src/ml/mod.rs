// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, runs or updates a network.
//
//   network.rs   — features → pool → classifier composition
//   registry.rs  — model name → network family
//   wrapper.rs   — ModelWrapper: inference, checkpoints,
//                  parameter activation, device placement
//   trainer.rs   — train / validate epoch loop on the wrapper
//   optim.rs     — optimizer factory, parameter groups, StepLr
//   amp.rs       — gradient scaler for loss-scaled training
//   criterion.rs — loss functions
//   parallel.rs  — per-device inference replicas
//   params.rs    — parameter / gradient visitors

pub mod amp;
pub mod criterion;
pub mod network;
pub mod optim;
pub mod parallel;
pub mod params;
pub mod registry;
pub mod trainer;
pub mod wrapper;
