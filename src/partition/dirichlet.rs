//! Dirichlet partitioning.
//!
//! See the [partition module] documentation since this is a private module anyways.
//!
//! [partition module]: crate::partition

use std::cmp::Ordering;

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use tracing::trace;

use super::PartitionError;
use crate::source::IndexSet;

/// Draws a proportion vector from a symmetric Dirichlet distribution.
///
/// The vector is sampled as normalized `Gamma(alpha, 1)` draws. If all draws underflow to zero,
/// which happens for tiny concentrations, the whole mass goes to a single uniformly chosen
/// participant, the limit of the distribution for `alpha -> 0`.
pub fn proportions<R>(
    num_participants: usize,
    alpha: f64,
    rng: &mut R,
) -> Result<Vec<f64>, PartitionError>
where
    R: Rng + ?Sized,
{
    let gamma = Gamma::new(alpha, 1.).map_err(|_| PartitionError::InvalidAlpha(alpha))?;
    let mut draws = (0..num_participants)
        .map(|_| gamma.sample(rng))
        .collect::<Vec<f64>>();
    let total: f64 = draws.iter().sum();
    if total > 0. && total.is_finite() {
        draws.iter_mut().for_each(|draw| *draw /= total);
    } else {
        draws.iter_mut().for_each(|draw| *draw = 0.);
        draws[rng.gen_range(0..num_participants)] = 1.;
    }
    Ok(draws)
}

/// Converts proportions into sample counts which sum up to `class_size`.
///
/// Counts are the floored shares, and the remaining samples go one each to the participants with
/// the largest proportions. Ties are broken in favor of the higher participant id.
pub fn counts(proportions: &[f64], class_size: usize) -> Vec<usize> {
    let mut counts = proportions
        .iter()
        .map(|p| ((p * class_size as f64).floor() as usize).min(class_size))
        .collect::<Vec<_>>();

    let mut by_proportion = (0..proportions.len()).collect::<Vec<_>>();
    by_proportion.sort_by(|&a, &b| {
        proportions[b]
            .partial_cmp(&proportions[a])
            .unwrap_or(Ordering::Equal)
            .then(b.cmp(&a))
    });

    let mut assigned: usize = counts.iter().sum();
    // rounding errors might overshoot in degenerate cases, take back from the smallest shares
    for &participant in by_proportion.iter().rev().cycle() {
        if assigned <= class_size {
            break;
        }
        if counts[participant] > 0 {
            counts[participant] -= 1;
            assigned -= 1;
        }
    }
    for &participant in by_proportion.iter().cycle() {
        if assigned >= class_size {
            break;
        }
        counts[participant] += 1;
        assigned += 1;
    }
    counts
}

/// Slices every shuffled class into per-participant chunks sized by Dirichlet proportions.
pub fn split<R>(
    classes: &[Vec<usize>],
    num_participants: usize,
    alpha: f64,
    rng: &mut R,
) -> Result<Vec<IndexSet>, PartitionError>
where
    R: Rng + ?Sized,
{
    let mut shares = vec![IndexSet::new(); num_participants];
    for (class, indices) in classes.iter().enumerate() {
        let proportions = proportions(num_participants, alpha, rng)?;
        let counts = counts(&proportions, indices.len());
        trace!("class {} counts per participant: {:?}", class, counts);

        let mut start = 0;
        for (share, count) in shares.iter_mut().zip(counts) {
            share.extend_from_slice(&indices[start..start + count]);
            start += count;
        }
    }
    Ok(shares)
}
