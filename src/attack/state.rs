//! Attack state precomputed once per wrapper.
//!
//! See the [attack module] documentation since this is a private module anyways.
//!
//! [attack module]: crate::attack

use rand::{
    distributions::{Distribution, WeightedError, WeightedIndex},
    Rng,
};

use crate::source::Label;

/// The weight the true class keeps in a [`ProbabilityTable`] row before normalization.
pub const RESIDUAL_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Maps every class to the class it is confused with, `c -> (c + 1) mod C`.
pub struct ConfusionMap(Vec<Label>);

impl ConfusionMap {
    pub fn new(num_classes: usize) -> Self {
        Self((0..num_classes).map(|c| (c + 1) % num_classes).collect())
    }

    pub fn get(&self, label: Label) -> Option<Label> {
        self.0.get(label).copied()
    }
}

/// Gets the circular distance between two classes.
pub fn circular_distance(from: Label, to: Label, num_classes: usize) -> usize {
    let forward = (to + num_classes - from) % num_classes;
    let backward = (from + num_classes - to) % num_classes;
    forward.min(backward)
}

#[derive(Debug, Clone)]
/// Per-class categorical distributions over corrupted labels.
///
/// The weight of class `j` in the row of true class `i` is their circular distance, and the true
/// class itself keeps [`RESIDUAL_WEIGHT`]. Rows are normalized to sum to `1`. Classes at equal
/// distance on either side of the true class get identical weights; sampling walks the row in
/// ascending class order.
pub struct ProbabilityTable {
    rows: Vec<Vec<f64>>,
    samplers: Vec<WeightedIndex<f64>>,
}

impl ProbabilityTable {
    /// Builds the table for the given number of classes.
    ///
    /// # Errors
    /// Fails if a row has no positive weight, which can't happen for `num_classes > 0`.
    pub fn new(num_classes: usize) -> Result<Self, WeightedError> {
        let rows = (0..num_classes)
            .map(|true_class| {
                let weights = (0..num_classes)
                    .map(|class| {
                        if class == true_class {
                            RESIDUAL_WEIGHT
                        } else {
                            circular_distance(true_class, class, num_classes) as f64
                        }
                    })
                    .collect::<Vec<_>>();
                let total: f64 = weights.iter().sum();
                weights.into_iter().map(|w| w / total).collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let samplers = rows
            .iter()
            .map(WeightedIndex::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows, samplers })
    }

    /// Gets the distribution over corrupted labels for a true label.
    pub fn row(&self, label: Label) -> Option<&[f64]> {
        self.rows.get(label).map(Vec::as_slice)
    }

    /// Draws a corrupted label for a true label.
    pub fn sample<R: Rng + ?Sized>(&self, label: Label, rng: &mut R) -> Option<Label> {
        self.samplers.get(label).map(|sampler| sampler.sample(rng))
    }
}

/// Draws one label offset in `[0, num_classes)` per sample.
pub fn alternating_offsets<R: Rng + ?Sized>(
    len: usize,
    num_classes: usize,
    rng: &mut R,
) -> Vec<usize> {
    (0..len).map(|_| rng.gen_range(0..num_classes)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Splits a source into four contiguous quarters of sizes `n/4, n/4, n/4` and the remainder.
pub struct QuarterMap {
    len: usize,
    quarter_size: usize,
}

impl QuarterMap {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            quarter_size: len / 4,
        }
    }

    /// Gets the quarter of an index.
    pub fn quarter(&self, idx: usize) -> Option<usize> {
        if idx >= self.len {
            None
        } else if self.quarter_size == 0 {
            Some(3)
        } else {
            Some((idx / self.quarter_size).min(3))
        }
    }

    /// Applies the label rule of the index's quarter.
    pub fn corrupt(&self, idx: usize, label: Label, num_classes: usize) -> Option<Label> {
        self.quarter(idx).map(|quarter| match quarter {
            0 => (label + 1) % num_classes,
            1 => (label + num_classes / 2) % num_classes,
            2 => label,
            _ => num_classes - label - 1,
        })
    }
}
