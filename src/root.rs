//! Selection of the root set.
//!
//! The root set is a small trusted sample of a source which is kept apart from the participants,
//! e.g. as a reference for robust aggregation. It can be biased towards one class: a fraction
//! `bias_probability` of it is drawn from that class and the rest from all other classes.
//!
//! The root set is drawn independently of any partition. To keep it apart from the participants,
//! partition a [`Share`] of its [`IndexSet::complement`] and map the resulting positions back with
//! [`Share::resolve_indices`].
//!
//! [`Share`]: crate::source::Share
//! [`Share::resolve_indices`]: crate::source::Share::resolve_indices

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::source::{indices_by_class, IndexSet, Label, SampleSource, SourceError};

#[derive(Debug, Error, PartialEq)]
/// Errors of the root set selection.
pub enum RootSetError {
    #[error("the number of classes must be positive")]
    NoClasses,
    #[error("bias class {bias_class} is out of range for {num_classes} classes")]
    InvalidBiasClass {
        bias_class: Label,
        num_classes: usize,
    },
    #[error("the bias probability must be in [0, 1], got {0}")]
    InvalidBiasProbability(f64),
    #[error("the root set ratio must be in [0, 1], got {0}")]
    InvalidRatio(f64),
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// The requested size of the root set.
pub enum RootSize {
    /// A fixed number of samples.
    Fixed(usize),
    /// A fraction of the source.
    Ratio(f64),
}

impl RootSize {
    /// Resolves the size for a source of the given length.
    pub fn resolve(&self, total: usize) -> usize {
        match *self {
            Self::Fixed(size) => size,
            Self::Ratio(ratio) => (total as f64 * ratio).round() as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Parameters of the root set selection.
pub struct RootSetParams {
    pub size: RootSize,
    pub bias_class: Label,
    pub bias_probability: f64,
}

/// Selects the root set of a source.
///
/// With a bias probability of `1` all samples come from the bias class. Otherwise
/// `floor(size * bias_probability)` samples come from the bias class and the rest from the other
/// classes, biased samples first. Every pool is sampled uniformly without replacement. Requests
/// exceeding a pool are clamped to the pool size and logged.
///
/// # Errors
/// Fails if the parameters are invalid or a label of the source is not in `[0, num_classes)`.
pub fn select_root<S, R>(
    source: &S,
    num_classes: usize,
    params: &RootSetParams,
    rng: &mut R,
) -> Result<IndexSet, RootSetError>
where
    S: SampleSource + ?Sized,
    R: Rng + ?Sized,
{
    let RootSetParams {
        size,
        bias_class,
        bias_probability,
    } = *params;
    if num_classes == 0 {
        return Err(RootSetError::NoClasses);
    }
    if bias_class >= num_classes {
        return Err(RootSetError::InvalidBiasClass {
            bias_class,
            num_classes,
        });
    }
    if !(0. ..=1.).contains(&bias_probability) {
        return Err(RootSetError::InvalidBiasProbability(bias_probability));
    }
    if let RootSize::Ratio(ratio) = size {
        if !(0. ..=1.).contains(&ratio) {
            return Err(RootSetError::InvalidRatio(ratio));
        }
    }

    let root_size = size.resolve(source.len());
    let mut classes = indices_by_class(source, num_classes)?;
    let biased = classes.swap_remove(bias_class);
    let mut others = classes.into_iter().flatten().collect::<Vec<_>>();
    others.sort_unstable();

    let (biased_size, other_size) = if bias_probability >= 1. {
        (root_size, 0)
    } else {
        let biased_size = (root_size as f64 * bias_probability).floor() as usize;
        (biased_size, root_size - biased_size)
    };
    debug!(
        "selecting a root set of {} samples: {} of class {} and {} others",
        root_size, biased_size, bias_class, other_size
    );

    let mut root = draw(&biased, biased_size, "biased", rng);
    root.extend(draw(&others, other_size, "other", rng));
    Ok(root.into())
}

fn draw<R>(pool: &[usize], requested: usize, name: &str, rng: &mut R) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    if requested > pool.len() {
        warn!(
            "requested {} {} root samples but only {} are available",
            requested,
            name,
            pool.len()
        );
    }
    pool.choose_multiple(rng, requested.min(pool.len()))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::source::{InMemorySource, Shape};

    fn source() -> InMemorySource {
        // 20 samples of class 0, 80 of class 1 to 4
        let labels = (0..100).map(|i| i % 5).collect();
        InMemorySource::from_labels(Shape::new(1, 1, 1), labels)
    }

    fn params(size: RootSize, bias_probability: f64) -> RootSetParams {
        RootSetParams {
            size,
            bias_class: 0,
            bias_probability,
        }
    }

    fn count_biased(source: &InMemorySource, root: &IndexSet) -> usize {
        root.iter()
            .filter(|&&idx| source.labels()[idx] == 0)
            .count()
    }

    #[test]
    fn test_root_size_resolve() {
        assert_eq!(RootSize::Fixed(7).resolve(1000), 7);
        assert_eq!(RootSize::Ratio(0.1).resolve(1000), 100);
        assert_eq!(RootSize::Ratio(0.0125).resolve(100), 1);
        assert_eq!(RootSize::Ratio(0.).resolve(100), 0);
    }

    #[test]
    fn test_select_root_fully_biased() {
        let source = source();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let root = select_root(&source, 5, &params(RootSize::Fixed(10), 1.), &mut rng).unwrap();
        assert_eq!(root.len(), 10);
        assert_eq!(count_biased(&source, &root), 10);
    }

    #[test]
    fn test_select_root_fully_biased_clamped() {
        let source = source();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let root = select_root(&source, 5, &params(RootSize::Fixed(50), 1.), &mut rng).unwrap();
        assert_eq!(root.len(), 20);
        assert_eq!(count_biased(&source, &root), 20);
    }

    #[test]
    fn test_select_root_partially_biased() {
        let source = source();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let root = select_root(&source, 5, &params(RootSize::Fixed(15), 0.5), &mut rng).unwrap();
        assert_eq!(root.len(), 15);
        assert_eq!(count_biased(&source, &root), 7);
        // biased samples come first
        assert!(root.iter().take(7).all(|&idx| idx % 5 == 0));
    }

    #[test]
    fn test_select_root_unbiased_pool_clamped() {
        let source = InMemorySource::from_labels(Shape::new(1, 1, 1), vec![0, 0, 0, 0, 1]);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let root = select_root(&source, 2, &params(RootSize::Fixed(4), 0.25), &mut rng).unwrap();
        // one biased sample requested, three others requested but only one exists
        assert_eq!(root.len(), 2);
        assert_eq!(count_biased(&source, &root), 1);
    }

    #[test]
    fn test_select_root_no_duplicates() {
        let source = source();
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let root = select_root(&source, 5, &params(RootSize::Ratio(0.5), 0.2), &mut rng).unwrap();
        assert_eq!(root.len(), 50);
        let mut indices = root.into_iter().collect::<Vec<_>>();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), 50);
    }

    #[test]
    fn test_select_root_errors() {
        let source = source();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        assert_eq!(
            select_root(&source, 0, &params(RootSize::Fixed(1), 0.5), &mut rng),
            Err(RootSetError::NoClasses)
        );
        assert_eq!(
            select_root(&source, 5, &params(RootSize::Fixed(1), 1.5), &mut rng),
            Err(RootSetError::InvalidBiasProbability(1.5))
        );
        assert_eq!(
            select_root(&source, 5, &params(RootSize::Ratio(2.), 0.5), &mut rng),
            Err(RootSetError::InvalidRatio(2.))
        );
        let params = RootSetParams {
            size: RootSize::Fixed(1),
            bias_class: 5,
            bias_probability: 0.5,
        };
        assert_eq!(
            select_root(&source, 5, &params, &mut rng),
            Err(RootSetError::InvalidBiasClass {
                bias_class: 5,
                num_classes: 5
            })
        );
    }
}
