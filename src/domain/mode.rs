// ============================================================
// Layer 3 — Batch Mode
// ============================================================
// Collaborators that unpack batches may behave differently
// during training (e.g. poisoning a fraction of the batch) and
// validation. The core passes this flag through untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Valid,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Train => write!(f, "train"),
            Mode::Valid => write!(f, "valid"),
        }
    }
}
