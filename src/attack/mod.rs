//! Data poisoning attacks.
//!
//! An [`Attack`] describes a label (and optionally data) corruption strategy. Wrapping a
//! [`SampleSource`] into a [`PoisonedSource`] precomputes the attack state once and then corrupts
//! every read, without changing the length or the order of the source.
//!
//! | Attack | Label rule | Data rule |
//! |---|---|---|
//! | [`Attack::LabelFlip`] | `C - label - 1` | unchanged |
//! | [`Attack::Backdoor`] | `target_label` | [`Trigger`] stamped and clamped |
//! | [`Attack::Adaptive`] | unchanged | unchanged |
//! | [`Attack::MinMax`] | `(label + 1) mod C` | unchanged |
//! | [`Attack::MinSum`] | drawn from a [`ProbabilityTable`] on every read | unchanged |
//! | [`Attack::Alternating`] | even indices shifted by a per-sample offset | unchanged |
//! | [`Attack::Targeted`] | `target_class -> target_output` | unchanged |
//! | [`Attack::GradientInversion`] | one rule per quarter of the source | unchanged |
//!
//! # Examples
//! ```
//! # use rand::SeedableRng;
//! # use rand_chacha::ChaCha20Rng;
//! # use xaynet_datasim::{attack::{Attack, PoisonedSource}, source::{InMemorySource, SampleSource, Shape}};
//! let source = InMemorySource::from_labels(Shape::new(1, 2, 2), vec![0, 1, 2]);
//! let mut rng = ChaCha20Rng::seed_from_u64(0);
//! let poisoned = PoisonedSource::new(&source, 3, &Attack::LabelFlip, &mut rng).unwrap();
//! assert_eq!(poisoned.label(0).unwrap(), 2);
//! assert_eq!(poisoned.len(), source.len());
//! ```

pub(crate) mod state;
pub(crate) mod trigger;

use std::sync::Mutex;

use derive_more::Display;
use rand::{distributions::WeightedError, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use self::{
    state::{circular_distance, ConfusionMap, ProbabilityTable, QuarterMap, RESIDUAL_WEIGHT},
    trigger::Trigger,
};
use crate::source::{checked_label, Label, Sample, SampleSource, SourceError};

#[derive(Debug, Error)]
/// Errors of attack construction.
pub enum AttackError {
    #[error("the number of classes must be positive")]
    NoClasses,
    #[error("the {0} attack requires a non-empty source")]
    EmptySource(Attack),
    #[error("{name} {label} is out of range for {num_classes} classes")]
    InvalidLabel {
        name: &'static str,
        label: Label,
        num_classes: usize,
    },
    #[error("building the probability table failed: {0}")]
    ProbabilityTable(#[from] WeightedError),
}

fn default_target_output() -> Label {
    1
}

#[derive(Debug, Display, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
/// A data poisoning strategy.
pub enum Attack {
    /// Flips every label `l` to `C - l - 1`.
    #[display(fmt = "label_flip")]
    LabelFlip,
    /// Stamps a trigger onto every sample and relabels it as `target_label`.
    #[display(fmt = "backdoor")]
    Backdoor {
        #[serde(default)]
        target_label: Label,
        #[serde(default)]
        trigger: Trigger,
    },
    /// Leaves the data untouched.
    #[display(fmt = "adaptive")]
    Adaptive,
    /// Maps every label to its most confusing class `(l + 1) mod C`.
    #[display(fmt = "min_max")]
    MinMax,
    /// Draws every label from a distribution favoring classes far away from the true one.
    #[display(fmt = "min_sum")]
    MinSum,
    /// Shifts the labels of even indices by a random per-sample offset.
    #[display(fmt = "alternating")]
    Alternating,
    /// Relabels `target_class` as `target_output`.
    #[display(fmt = "targeted")]
    Targeted {
        #[serde(default)]
        target_class: Label,
        #[serde(default = "default_target_output")]
        target_output: Label,
    },
    /// Applies a different label rule to each quarter of the source.
    #[display(fmt = "gradient_inversion")]
    GradientInversion,
}

#[derive(Debug)]
struct MinSumSampler {
    table: ProbabilityTable,
    rng: Mutex<ChaCha20Rng>,
}

impl MinSumSampler {
    fn sample(&self, label: Label) -> Option<Label> {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.table.sample(label, &mut *rng)
    }
}

#[derive(Debug)]
enum Strategy {
    LabelFlip,
    Backdoor { target_label: Label, trigger: Trigger },
    Adaptive,
    MinMax(ConfusionMap),
    MinSum(MinSumSampler),
    Alternating(Vec<usize>),
    Targeted { target_class: Label, target_output: Label },
    GradientInversion(QuarterMap),
}

#[derive(Debug)]
/// A sample source whose reads are corrupted by an [`Attack`].
pub struct PoisonedSource<S> {
    source: S,
    num_classes: usize,
    strategy: Strategy,
}

impl<S: SampleSource> PoisonedSource<S> {
    /// Wraps a source into an attack.
    ///
    /// Random attack state is drawn from `rng` here and nowhere else: the [`Attack::MinSum`]
    /// attack seeds its own generator from `rng` for the draws made on every read. Equal seeds
    /// therefore yield equal corruptions for equal read sequences.
    ///
    /// # Errors
    /// Fails if `num_classes` is zero, if a configured label isn't a valid class or if the
    /// [`Attack::Alternating`] or [`Attack::GradientInversion`] attacks wrap an empty source.
    pub fn new<R>(
        source: S,
        num_classes: usize,
        attack: &Attack,
        rng: &mut R,
    ) -> Result<Self, AttackError>
    where
        R: Rng + ?Sized,
    {
        if num_classes == 0 {
            return Err(AttackError::NoClasses);
        }
        let check = |name, label| {
            if label < num_classes {
                Ok(label)
            } else {
                Err(AttackError::InvalidLabel {
                    name,
                    label,
                    num_classes,
                })
            }
        };
        let strategy = match *attack {
            Attack::LabelFlip => Strategy::LabelFlip,
            Attack::Backdoor {
                target_label,
                trigger,
            } => Strategy::Backdoor {
                target_label: check("target label", target_label)?,
                trigger,
            },
            Attack::Adaptive => Strategy::Adaptive,
            Attack::MinMax => Strategy::MinMax(ConfusionMap::new(num_classes)),
            Attack::MinSum => Strategy::MinSum(MinSumSampler {
                table: ProbabilityTable::new(num_classes)?,
                rng: Mutex::new(ChaCha20Rng::from_seed(rng.gen())),
            }),
            Attack::Alternating => {
                if source.is_empty() {
                    return Err(AttackError::EmptySource(attack.clone()));
                }
                Strategy::Alternating(state::alternating_offsets(
                    source.len(),
                    num_classes,
                    rng,
                ))
            }
            Attack::Targeted {
                target_class,
                target_output,
            } => Strategy::Targeted {
                target_class: check("target class", target_class)?,
                target_output: check("target output", target_output)?,
            },
            Attack::GradientInversion => {
                if source.is_empty() {
                    return Err(AttackError::EmptySource(attack.clone()));
                }
                Strategy::GradientInversion(QuarterMap::new(source.len()))
            }
        };
        debug!(
            "wrapped a source of {} samples into the {} attack",
            source.len(),
            attack
        );

        Ok(Self {
            source,
            num_classes,
            strategy,
        })
    }

    /// Gets the number of classes the labels are corrupted within.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Gets the wrapped source.
    pub fn inner(&self) -> &S {
        &self.source
    }

    fn corrupt_label(&self, idx: usize, label: Label) -> Result<Label, SourceError> {
        let label = checked_label(label, self.num_classes)?;
        let out_of_range = || SourceError::OutOfRange {
            index: idx,
            len: self.source.len(),
        };
        let corrupted = match &self.strategy {
            Strategy::LabelFlip => self.num_classes - label - 1,
            Strategy::Backdoor { target_label, .. } => *target_label,
            Strategy::Adaptive => label,
            Strategy::MinMax(map) => map.get(label).ok_or_else(out_of_range)?,
            Strategy::MinSum(sampler) => sampler.sample(label).ok_or_else(out_of_range)?,
            Strategy::Alternating(offsets) => {
                let offset = offsets.get(idx).ok_or_else(out_of_range)?;
                if idx % 2 == 0 {
                    (label + offset) % self.num_classes
                } else {
                    label
                }
            }
            Strategy::Targeted {
                target_class,
                target_output,
            } => {
                if label == *target_class {
                    *target_output
                } else {
                    label
                }
            }
            Strategy::GradientInversion(quarters) => quarters
                .corrupt(idx, label, self.num_classes)
                .ok_or_else(out_of_range)?,
        };
        Ok(corrupted)
    }
}

impl<S: SampleSource> SampleSource for PoisonedSource<S> {
    fn len(&self) -> usize {
        self.source.len()
    }

    fn get(&self, idx: usize) -> Result<(Sample, Label), SourceError> {
        let (mut sample, label) = self.source.get(idx)?;
        if let Strategy::Backdoor { trigger, .. } = &self.strategy {
            trigger.apply(&mut sample);
        }
        Ok((sample, self.corrupt_label(idx, label)?))
    }

    fn label(&self, idx: usize) -> Result<Label, SourceError> {
        let label = self.source.label(idx)?;
        self.corrupt_label(idx, label)
    }
}
