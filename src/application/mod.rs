// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination

/// Concrete backend types for the binary
pub mod backend;

/// The training workflow
pub mod train_use_case;

/// Re-validation of a saved checkpoint, and model summaries
pub mod validate_use_case;
