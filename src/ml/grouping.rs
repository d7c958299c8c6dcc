// ============================================================
// Layer 5 — Parameter Groups and Optimizer
// ============================================================
// Splits a model's parameters into two fixed groups by name:
//
//   auxiliary → any parameter under a module whose name contains
//               "mlp" (the singing/version heads)
//   backbone  → everything else
//
// The split is computed once, before training, and never changes.
// It drives three things:
//   1. Learning rates: auxiliary = lr × adv_lr_multiplier,
//                      backbone  = lr
//   2. Freezing: only the backbone's require_grad flag is toggled
//   3. Gradient routing: after backward, gradients are clipped by
//      their global norm and handed to the optimizer per group
//
// Global norm clipping (same rule as torch's clip_grad_norm_):
//   norm  = sqrt(Σ ‖g‖²)            over every parameter gradient
//   coef  = max_norm / (norm + 1e-6)
//   g    ← g × min(coef, 1)

use std::collections::HashSet;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use burn::{
    module::{AutodiffModule, ModuleMapper, ModuleVisitor, Param, ParamId},
    optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::ml::model::LeitmotifDetector;

/// Module-name marker identifying auxiliary head parameters.
pub const AUXILIARY_MARKER: &str = "mlp";

/// Ceiling applied to the global gradient norm on every update.
pub const MAX_GRAD_NORM: f64 = 1.0;

const CLIP_EPSILON: f64 = 1e-6;

// ─── Groups ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct ParameterGroup {
    pub ids: HashSet<ParamId>,
    /// Dotted module path of each parameter, for logging
    pub names: Vec<String>,
    /// Factor applied to the base learning rate
    pub lr_multiplier: f64,
}

impl ParameterGroup {
    fn with_multiplier(lr_multiplier: f64) -> Self {
        Self { lr_multiplier, ..Self::default() }
    }

    fn insert(&mut self, id: ParamId, name: String) {
        self.ids.insert(id);
        self.names.push(name);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ParameterGroups {
    pub auxiliary: ParameterGroup,
    pub backbone:  ParameterGroup,
}

impl ParameterGroups {
    /// Partition every float parameter of `model` by module name.
    pub fn partition<B: Backend, M: Module<B>>(model: &M, adv_lr_multiplier: f64) -> Self {
        let mut visitor = NamePartition {
            path:   Vec::new(),
            groups: ParameterGroups {
                auxiliary: ParameterGroup::with_multiplier(adv_lr_multiplier),
                backbone:  ParameterGroup::with_multiplier(1.0),
            },
        };
        model.visit(&mut visitor);

        let groups = visitor.groups;
        tracing::debug!(
            "Parameter groups: {} auxiliary, {} backbone",
            groups.auxiliary.len(),
            groups.backbone.len()
        );
        groups
    }

    pub fn is_auxiliary(&self, id: &ParamId) -> bool {
        self.auxiliary.ids.contains(id)
    }
}

struct NamePartition {
    path:   Vec<String>,
    groups: ParameterGroups,
}

impl<B: Backend> ModuleVisitor<B> for NamePartition {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let name = self.path.join(".");
        if self.path.iter().any(|segment| segment.contains(AUXILIARY_MARKER)) {
            self.groups.auxiliary.insert(param.id, name);
        } else {
            self.groups.backbone.insert(param.id, name);
        }
    }
}

// ─── Freezing ────────────────────────────────────────────────────────────────
/// Set the require_grad flag of every parameter in `ids`.
pub fn set_require_grad<B: Backend, M: Module<B>>(model: M, ids: &HashSet<ParamId>, require_grad: bool) -> M {
    let mut mapper = RequireGrad { ids, require_grad };
    model.map(&mut mapper)
}

struct RequireGrad<'a> {
    ids:          &'a HashSet<ParamId>,
    require_grad: bool,
}

impl<B: Backend> ModuleMapper<B> for RequireGrad<'_> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        if !self.ids.contains(&param.id) {
            return param;
        }
        let (id, tensor, mapper) = param.consume();
        Param::from_mapped_value(id, tensor.set_require_grad(self.require_grad), mapper)
    }
}

/// Scoped backbone freeze.
///
/// Freezes the backbone on construction and unfreezes it when dropped,
/// so every exit path (normal return, `?` propagation, panic unwind)
/// leaves the backbone trainable again.
pub struct FrozenBackbone<'a, B: Backend, M: LeitmotifDetector<B>> {
    model:    &'a mut M,
    groups:   &'a ParameterGroups,
    _backend: PhantomData<B>,
}

impl<'a, B: Backend, M: LeitmotifDetector<B>> FrozenBackbone<'a, B, M> {
    pub fn new(model: &'a mut M, groups: &'a ParameterGroups) -> Self {
        *model = model.clone().freeze_backbone(groups);
        Self { model, groups, _backend: PhantomData }
    }
}

impl<B: Backend, M: LeitmotifDetector<B>> Deref for FrozenBackbone<'_, B, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<B: Backend, M: LeitmotifDetector<B>> DerefMut for FrozenBackbone<'_, B, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<B: Backend, M: LeitmotifDetector<B>> Drop for FrozenBackbone<'_, B, M> {
    fn drop(&mut self) {
        *self.model = self.model.clone().unfreeze_backbone(self.groups);
        tracing::debug!("Backbone unfrozen");
    }
}

// ─── Gradient clipping and routing ───────────────────────────────────────────
/// Scale factor that brings `total_norm` down to at most `max_norm`.
pub fn clip_coefficient(total_norm: f64, max_norm: f64) -> f64 {
    (max_norm / (total_norm + CLIP_EPSILON)).min(1.0)
}

/// Clipped gradients, split by parameter group.
pub struct GroupedGradients {
    pub auxiliary: GradientsParams,
    pub backbone:  GradientsParams,
    /// Global norm before clipping
    pub norm: f64,
}

/// Clip the gradients of `model` by global norm and split them by group.
pub fn route_gradients<B, M>(
    model:    &M,
    mut grads: B::Gradients,
    groups:   &ParameterGroups,
    max_norm: f64,
) -> GroupedGradients
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut squared = SquaredNorm::<B> { grads: &grads, total: 0.0 };
    model.visit(&mut squared);
    let norm = squared.total.sqrt();

    let mut router = GroupRouter::<B> {
        grads:     &mut grads,
        groups,
        scale:     clip_coefficient(norm, max_norm),
        auxiliary: GradientsParams::new(),
        backbone:  GradientsParams::new(),
    };
    model.visit(&mut router);

    GroupedGradients {
        auxiliary: router.auxiliary,
        backbone:  router.backbone,
        norm,
    }
}

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a B::Gradients,
    total: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        if let Some(grad) = param.val().grad(self.grads) {
            self.total += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct GroupRouter<'a, B: AutodiffBackend> {
    grads:     &'a mut B::Gradients,
    groups:    &'a ParameterGroups,
    scale:     f64,
    auxiliary: GradientsParams,
    backbone:  GradientsParams,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GroupRouter<'_, B> {
    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let Some(grad) = param.val().grad_remove(self.grads) else {
            return;
        };
        let grad = if self.scale < 1.0 { grad.mul_scalar(self.scale) } else { grad };
        if self.groups.is_auxiliary(&param.id) {
            self.auxiliary.register(param.id, grad);
        } else {
            self.backbone.register(param.id, grad);
        }
    }
}

// ─── Optimizer ───────────────────────────────────────────────────────────────
/// One optimizer applied with a separate learning rate per group.
///
/// Gradients never accumulate between updates: each `apply` starts from
/// a fresh backward pass, so there is nothing to zero beforehand.
pub struct GroupedOptimizer<O> {
    inner:   O,
    base_lr: f64,
    groups:  ParameterGroups,
}

pub type AdamOptimizer<M, B> = OptimizerAdaptor<Adam, M, B>;

/// Adam over two parameter groups, epsilon 1e-8.
pub fn build_optimizer<B, M>(model: &M, lr: f64, adv_lr_multiplier: f64) -> GroupedOptimizer<AdamOptimizer<M, B>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let groups = ParameterGroups::partition::<B, M>(model, adv_lr_multiplier);
    let inner  = AdamConfig::new().with_epsilon(1e-8).init::<B, M>();
    GroupedOptimizer::new(inner, lr, groups)
}

impl<O> GroupedOptimizer<O> {
    pub fn new(inner: O, base_lr: f64, groups: ParameterGroups) -> Self {
        Self { inner, base_lr, groups }
    }

    pub fn groups(&self) -> &ParameterGroups {
        &self.groups
    }

    /// Re-key the groups to the parameter ids of `model` (same names,
    /// same multipliers). Needed after loading a record, which brings
    /// its own ids.
    pub fn regroup<B: Backend, M: Module<B>>(&mut self, model: &M) {
        self.groups = ParameterGroups::partition::<B, M>(model, self.groups.auxiliary.lr_multiplier);
    }

    pub fn auxiliary_lr(&self) -> f64 {
        self.base_lr * self.groups.auxiliary.lr_multiplier
    }

    pub fn backbone_lr(&self) -> f64 {
        self.base_lr * self.groups.backbone.lr_multiplier
    }

    /// Backpropagate `loss`, clip the global gradient norm to
    /// `MAX_GRAD_NORM`, then update both groups. Returns the updated
    /// model and the pre-clip gradient norm.
    pub fn apply<B, M>(&mut self, model: M, loss: Tensor<B, 1>) -> (M, f64)
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let grads   = loss.backward();
        let grouped = route_gradients::<B, M>(&model, grads, &self.groups, MAX_GRAD_NORM);

        let model = self.inner.step(self.auxiliary_lr(), model, grouped.auxiliary);
        let model = self.inner.step(self.backbone_lr(), model, grouped.backbone);
        (model, grouped.norm)
    }

    pub fn to_record<B, M>(&self) -> O::Record
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        self.inner.to_record()
    }

    pub fn load_record<B, M>(self, record: O::Record) -> Self
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        Self { inner: self.inner.load_record(record), ..self }
    }
}
