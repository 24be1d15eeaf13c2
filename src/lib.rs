//! Image-classifier core for backdoor (trojan) research: a model wrapper
//! around a configurable network, a train/validate loop, top-k metrics, an
//! optimizer factory and checkpoint I/O.
//!
//! Layers, outermost first:
//!
//! 1. [`cli`]         — clap commands
//! 2. [`application`] — use cases wiring everything together
//! 3. [`domain`]      — backend-free types
//! 4. [`data`]        — samples, datasets, batching
//! 5. [`ml`]          — networks, wrapper, optimizer, training
//! 6. [`infra`]       — checkpoints, metrics, environment

#![recursion_limit = "256"]

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod infra;
pub mod ml;

pub use error::{ModelError, Result};
