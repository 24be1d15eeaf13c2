// ============================================================
// Layer 2 — Backend Selection
// ============================================================
// The binary runs on NdArray (CPU) by default; building with
// `--features wgpu` switches to the GPU backend. Training needs
// the Autodiff wrapper, validation runs on the inner backend.

#[cfg(feature = "wgpu")]
pub type AppInnerBackend = burn::backend::Wgpu;

#[cfg(not(feature = "wgpu"))]
pub type AppInnerBackend = burn::backend::NdArray;

pub type AppBackend = burn::backend::Autodiff<AppInnerBackend>;
