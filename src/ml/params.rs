// ============================================================
// Layer 5 — Parameter Visitors
// ============================================================
// Burn modules expose their parameters through the visitor
// pattern. These helpers walk a module to
//
//   • list parameter ids (to describe a trainable group)
//   • list parameter shapes / values (checkpoint validation, tests)
//   • keep only the gradients of the active group
//   • unscale gradients after a scaled backward pass
//
// Gradients live on the inner (non-autodiff) backend, so the
// gradient visitors move tensors of `B::InnerBackend`.

use std::{collections::HashSet, marker::PhantomData};

use burn::{
    module::{AutodiffModule, Module, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

// ─── Read-only walks ─────────────────────────────────────────────────────────

struct IdCollector {
    ids: Vec<ParamId>,
}

impl<B: Backend> ModuleVisitor<B> for IdCollector {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        self.ids.push(id);
    }
}

/// Ids of every float parameter in `module`, in visiting order.
pub fn param_ids<B: Backend, M: Module<B>>(module: &M) -> Vec<ParamId> {
    let mut collector = IdCollector { ids: Vec::new() };
    module.visit(&mut collector);
    collector.ids
}

struct ShapeCollector {
    shapes: Vec<Vec<usize>>,
}

impl<B: Backend> ModuleVisitor<B> for ShapeCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

/// Shapes of every float parameter in `module`, in visiting order.
pub fn param_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut collector = ShapeCollector { shapes: Vec::new() };
    module.visit(&mut collector);
    collector.shapes
}

struct ValueCollector {
    values: Vec<Vec<f32>>,
}

impl<B: Backend> ModuleVisitor<B> for ValueCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.values.push(tensor.to_data().iter::<f32>().collect());
    }
}

/// Host copies of every float parameter in `module`, in visiting order.
pub fn param_values<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<f32>> {
    let mut collector = ValueCollector { values: Vec::new() };
    module.visit(&mut collector);
    collector.values
}

// ─── Gradient filtering ──────────────────────────────────────────────────────

struct GradRetainer<'a, B: AutodiffBackend> {
    keep:    &'a HashSet<ParamId>,
    source:  GradientsParams,
    dest:    GradientsParams,
    _marker: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradRetainer<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if !self.keep.contains(&id) {
            return;
        }
        if let Some(grad) = self.source.remove::<B::InnerBackend, D>(id.clone()) {
            self.dest.register::<B::InnerBackend, D>(id, grad);
        }
    }
}

/// Drop every gradient whose parameter is not in `keep`.
///
/// The optimizer leaves parameters without a gradient untouched, so this is
/// how a step is restricted to one parameter group.
pub fn retain_grads<B, M>(module: &M, grads: GradientsParams, keep: &HashSet<ParamId>) -> GradientsParams
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut retainer = GradRetainer::<B> {
        keep,
        source:  grads,
        dest:    GradientsParams::new(),
        _marker: PhantomData,
    };
    module.visit(&mut retainer);
    retainer.dest
}

// ─── Gradient unscaling ──────────────────────────────────────────────────────

struct GradUnscaler<'a, B: AutodiffBackend> {
    grads:     &'a mut GradientsParams,
    inv_scale: f64,
    finite:    bool,
    _marker:   PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradUnscaler<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id.clone()) {
            let grad = grad.mul_scalar(self.inv_scale);
            // |g| summed is inf/NaN iff some element is.
            let magnitude: f64 = grad.clone().abs().sum().into_scalar().elem::<f64>();
            if !magnitude.is_finite() {
                self.finite = false;
            }
            self.grads.register::<B::InnerBackend, D>(id, grad);
        }
    }
}

/// Multiply every gradient of `module` by `inv_scale` in place.
/// Returns false if any gradient holds a non-finite value.
pub fn unscale_grads<B, M>(module: &M, grads: &mut GradientsParams, inv_scale: f64) -> bool
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut unscaler = GradUnscaler::<B> {
        grads,
        inv_scale,
        finite:  true,
        _marker: PhantomData,
    };
    module.visit(&mut unscaler);
    unscaler.finite
}
