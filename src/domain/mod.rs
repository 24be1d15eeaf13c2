// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what the core
// works with. No Burn types live here, so everything in this
// layer can be tested without a backend.
//
//   dataset.rs — dataset descriptor handed to the model wrapper
//   mode.rs    — which phase a batch is being unpacked for
//   traits.rs  — abstractions other layers implement

/// Dataset descriptor and the by-name reference form
pub mod dataset;

/// Train / validation mode flag
pub mod mode;

/// Core abstractions (traits) that other layers implement
pub mod traits;
