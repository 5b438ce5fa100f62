use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;

use crate::error::{Error, Result};
use crate::model::{SegmentationNet, SegmentationOutput};
use crate::training::param_groups::{GroupSlot, ParamGroup, ParamGroups};
use crate::training::schedule::poly_learning_rate;
use crate::training::TrainingConfig;

/// Scalar losses of one optimisation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    pub main_loss: f32,
    pub aux_loss: Option<f32>,
    pub total: f32,
}

/// Detach the gradients of one group's parameters from `grads`.
fn group_gradients<B: AutodiffBackend>(
    model: &SegmentationNet<B>,
    slot: GroupSlot,
    grads: &mut B::Gradients,
) -> Option<GradientsParams> {
    let backbone = match model {
        SegmentationNet::Simple(net) => &net.backbone,
        SegmentationNet::PspNet(net) => &net.backbone,
    };

    let params = match (slot, model) {
        (GroupSlot::Stem, _) => GradientsParams::from_module::<B, _>(grads, &backbone.stem),
        (GroupSlot::Layer1, _) => GradientsParams::from_module::<B, _>(grads, &backbone.layer1),
        (GroupSlot::Layer2, _) => GradientsParams::from_module::<B, _>(grads, &backbone.layer2),
        (GroupSlot::Layer3, _) => GradientsParams::from_module::<B, _>(grads, &backbone.layer3),
        (GroupSlot::Layer4, _) => GradientsParams::from_module::<B, _>(grads, &backbone.layer4),
        (GroupSlot::Ppm, SegmentationNet::PspNet(net)) => {
            GradientsParams::from_module::<B, _>(grads, net.ppm.as_ref()?)
        }
        (GroupSlot::Classifier, SegmentationNet::PspNet(net)) => {
            GradientsParams::from_module::<B, _>(grads, &net.cls)
        }
        (GroupSlot::Classifier, SegmentationNet::Simple(net)) => {
            GradientsParams::from_module::<B, _>(grads, &net.cls)
        }
        (GroupSlot::AuxClassifier, SegmentationNet::PspNet(net)) => {
            GradientsParams::from_module::<B, _>(grads, &net.aux)
        }
        _ => return None,
    };

    Some(params)
}

/// Owns the model and one optimizer per parameter group.
pub struct Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SegmentationNet<B>, B>,
{
    pub model: SegmentationNet<B>,
    optimizers: Vec<O>,
    groups: ParamGroups,
    aux_weight: f64,
    base_lr: f64,
    power: f64,
    max_iter: usize,
}

/// SGD configured from one group's momentum and weight decay.
fn group_sgd<B: AutodiffBackend>(group: &ParamGroup) -> impl Optimizer<SegmentationNet<B>, B> {
    let momentum = (group.momentum > 0.0)
        .then(|| MomentumConfig::new().with_momentum(group.momentum));
    let weight_decay =
        (group.weight_decay > 0.0).then(|| WeightDecayConfig::new(group.weight_decay as f32));

    SgdConfig::new()
        .with_momentum(momentum)
        .with_weight_decay(weight_decay)
        .init::<B, SegmentationNet<B>>()
}

/// Trainer driving SGD with the configured momentum and weight decay.
pub fn sgd_trainer<B: AutodiffBackend>(
    model: SegmentationNet<B>,
    config: &TrainingConfig,
) -> Trainer<B, impl Optimizer<SegmentationNet<B>, B>> {
    let groups =
        ParamGroups::for_model(&model, config.base_lr, config.momentum, config.weight_decay);
    Trainer::new(model, groups, config, group_sgd::<B>)
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SegmentationNet<B>, B>,
{
    /// `optimizer` is called once per group, in group order.
    pub fn new(
        model: SegmentationNet<B>,
        groups: ParamGroups,
        config: &TrainingConfig,
        optimizer: impl Fn(&ParamGroup) -> O,
    ) -> Self {
        let optimizers = groups.iter().map(optimizer).collect();
        Self {
            model,
            optimizers,
            groups,
            aux_weight: config.aux_weight,
            base_lr: config.base_lr,
            power: config.power,
            max_iter: config.max_iter,
        }
    }

    pub fn groups(&self) -> &ParamGroups {
        &self.groups
    }

    pub fn set_learning_rate(&mut self, lr: f64) {
        self.groups.update_learning_rate(lr);
    }

    /// Apply the poly schedule for iteration `iter`; returns the new base rate.
    pub fn schedule(&mut self, iter: usize) -> f64 {
        let lr = poly_learning_rate(self.base_lr, iter, self.max_iter, self.power);
        self.set_learning_rate(lr);
        lr
    }

    /// Forward with labels, backward, then one optimizer step per group.
    pub fn train_step(
        &mut self,
        images: Tensor<B, 4>,
        labels: Tensor<B, 3, Int>,
    ) -> Result<StepLosses> {
        let output = self.model.forward(images, Some(labels))?;
        let main_loss = output.main_loss.ok_or(Error::MissingLoss)?;

        let main_value = main_loss.clone().into_scalar().elem::<f32>();
        let (loss, aux_value) = match output.aux_loss {
            Some(aux_loss) => {
                let aux_value = aux_loss.clone().into_scalar().elem::<f32>();
                (main_loss + aux_loss * self.aux_weight, Some(aux_value))
            }
            None => (main_loss, None),
        };
        let total = loss.clone().into_scalar().elem::<f32>();

        let mut grads = loss.backward();
        let mut model = self.model.clone();
        for (group, optimizer) in self.groups.iter().zip(self.optimizers.iter_mut()) {
            if let Some(params) = group_gradients(&model, group.slot, &mut grads) {
                model = optimizer.step(group.lr, model, params);
            }
        }
        self.model = model;

        log::debug!(
            "train step: main={:.4} aux={:?} total={:.4}",
            main_value,
            aux_value,
            total
        );

        Ok(StepLosses {
            main_loss: main_value,
            aux_loss: aux_value,
            total,
        })
    }

    /// Evaluation-mode forward on the inner backend (no dropout, running BN stats).
    pub fn validate_step(
        &self,
        images: Tensor<B::InnerBackend, 4>,
        labels: Option<Tensor<B::InnerBackend, 3, Int>>,
    ) -> Result<SegmentationOutput<B::InnerBackend>> {
        self.model.valid().forward(images, labels)
    }
}
