//! Parameter groups with differential learning rates.
//!
//! Pretrained backbone stages train at the base rate, freshly initialised
//! heads at [`HEAD_LR_MULTIPLIER`] times that. Each group is tagged with its
//! [`GroupRole`] when created and rate updates select groups by role.

use std::fmt;

use burn::prelude::*;

use crate::model::SegmentationNet;

pub const HEAD_LR_MULTIPLIER: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Backbone,
    Head,
}

impl GroupRole {
    pub fn lr_multiplier(&self) -> f64 {
        match self {
            Self::Backbone => 1.0,
            Self::Head => HEAD_LR_MULTIPLIER,
        }
    }
}

/// The sub-module whose parameters a group owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSlot {
    Stem,
    Layer1,
    Layer2,
    Layer3,
    Layer4,
    Ppm,
    Classifier,
    AuxClassifier,
}

impl GroupSlot {
    pub const BACKBONE: [GroupSlot; 5] = [
        GroupSlot::Stem,
        GroupSlot::Layer1,
        GroupSlot::Layer2,
        GroupSlot::Layer3,
        GroupSlot::Layer4,
    ];

    pub fn role(&self) -> GroupRole {
        match self {
            Self::Stem | Self::Layer1 | Self::Layer2 | Self::Layer3 | Self::Layer4 => {
                GroupRole::Backbone
            }
            Self::Ppm | Self::Classifier | Self::AuxClassifier => GroupRole::Head,
        }
    }
}

impl fmt::Display for GroupSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stem => "layer0",
            Self::Layer1 => "layer1",
            Self::Layer2 => "layer2",
            Self::Layer3 => "layer3",
            Self::Layer4 => "layer4",
            Self::Ppm => "ppm",
            Self::Classifier => "cls",
            Self::AuxClassifier => "aux",
        };
        f.write_str(name)
    }
}

impl<B: Backend> SegmentationNet<B> {
    /// Group order: stem, stage 1-4, [PPM], classifier, [auxiliary classifier].
    pub fn group_layout(&self) -> Vec<GroupSlot> {
        let mut slots = GroupSlot::BACKBONE.to_vec();
        match self {
            Self::Simple(_) => slots.push(GroupSlot::Classifier),
            Self::PspNet(net) => {
                if net.ppm.is_some() {
                    slots.push(GroupSlot::Ppm);
                }
                slots.push(GroupSlot::Classifier);
                slots.push(GroupSlot::AuxClassifier);
            }
        }
        slots
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamGroup {
    pub slot: GroupSlot,
    pub role: GroupRole,
    pub lr: f64,
    pub momentum: f64,
    pub weight_decay: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamGroups {
    groups: Vec<ParamGroup>,
}

impl ParamGroups {
    pub fn new(slots: &[GroupSlot], base_lr: f64, momentum: f64, weight_decay: f64) -> Self {
        let groups = slots
            .iter()
            .map(|&slot| {
                let role = slot.role();
                ParamGroup {
                    slot,
                    role,
                    lr: base_lr * role.lr_multiplier(),
                    momentum,
                    weight_decay,
                }
            })
            .collect();

        Self { groups }
    }

    pub fn for_model<B: Backend>(
        model: &SegmentationNet<B>,
        base_lr: f64,
        momentum: f64,
        weight_decay: f64,
    ) -> Self {
        let groups = Self::new(&model.group_layout(), base_lr, momentum, weight_decay);
        log::info!("Parameter groups: {}", groups);
        groups
    }

    /// Backbone groups get `lr`, head groups `lr * HEAD_LR_MULTIPLIER`.
    pub fn update_learning_rate(&mut self, lr: f64) {
        for group in &mut self.groups {
            group.lr = lr * group.role.lr_multiplier();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamGroup> {
        self.groups.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ParamGroup> {
        self.groups.get(index)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl fmt::Display for ParamGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, group) in self.groups.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}@{:e}", group.slot, group.lr)?;
        }
        Ok(())
    }
}
