//! Partitioning of a sample source across federated learning participants.
//!
//! [`partition()`] splits the index domain of a source into one [`IndexSet`] per participant.
//! Every index ends up in exactly one set, and there are always exactly `num_participants` sets,
//! some of which may be empty if there are more participants than samples. The split follows a
//! [`Policy`]:
//!
//! - [`Policy::Iid`]: uniformly shuffled, near-equal blocks.
//! - [`Policy::LabelSkew`]: every class prefers one participant, round-robin, which receives a
//!   sample of that class with probability `q`.
//! - [`Policy::Dirichlet`]: per-class proportions drawn from a symmetric Dirichlet distribution
//!   with concentration `alpha`.
//!
//! All randomness comes from the caller's generator, hence equal seeds yield equal partitions.

pub(crate) mod dirichlet;
pub(crate) mod iid;
pub(crate) mod label_skew;
pub mod stats;

use std::str::FromStr;

use derive_more::Display;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use self::{label_skew::preferred_participants, stats::PartitionStats};
use crate::source::{indices_by_class, IndexSet, SampleSource, SourceError};

#[derive(Debug, Error, PartialEq)]
/// Errors of partitioning.
pub enum PartitionError {
    #[error("unknown distribution type: {0}")]
    UnknownDistribution(String),
    #[error("the number of participants must be positive")]
    NoParticipants,
    #[error("the number of classes must be positive")]
    NoClasses,
    #[error("the label skew probability must be in [0, 1], got {0}")]
    InvalidQ(f64),
    #[error("the dirichlet concentration must be positive and finite, got {0}")]
    InvalidAlpha(f64),
    #[error(transparent)]
    Source(#[from] SourceError),
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// The name of a distribution policy.
pub enum DistributionType {
    #[display(fmt = "iid")]
    Iid,
    #[display(fmt = "label_skew")]
    LabelSkew,
    #[display(fmt = "dirichlet")]
    Dirichlet,
}

impl FromStr for DistributionType {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iid" => Ok(Self::Iid),
            "label_skew" => Ok(Self::LabelSkew),
            "dirichlet" => Ok(Self::Dirichlet),
            _ => Err(PartitionError::UnknownDistribution(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// A validated distribution policy.
pub enum Policy {
    Iid,
    LabelSkew { q: f64 },
    Dirichlet { alpha: f64 },
}

impl Policy {
    /// Creates a policy of the given type. Only the parameter of the chosen type is checked.
    ///
    /// # Errors
    /// Fails if `q` is not in `[0, 1]` for label skew or `alpha` is not positive for Dirichlet.
    pub fn new(distribution: DistributionType, q: f64, alpha: f64) -> Result<Self, PartitionError> {
        match distribution {
            DistributionType::Iid => Ok(Self::Iid),
            DistributionType::LabelSkew if (0. ..=1.).contains(&q) => Ok(Self::LabelSkew { q }),
            DistributionType::LabelSkew => Err(PartitionError::InvalidQ(q)),
            DistributionType::Dirichlet if alpha > 0. && alpha.is_finite() => {
                Ok(Self::Dirichlet { alpha })
            }
            DistributionType::Dirichlet => Err(PartitionError::InvalidAlpha(alpha)),
        }
    }

    /// Creates a policy from its name.
    ///
    /// # Errors
    /// Fails if the name is unknown or the parameter is invalid.
    pub fn from_name(name: &str, q: f64, alpha: f64) -> Result<Self, PartitionError> {
        Self::new(name.parse()?, q, alpha)
    }

    pub fn distribution_type(&self) -> DistributionType {
        match self {
            Self::Iid => DistributionType::Iid,
            Self::LabelSkew { .. } => DistributionType::LabelSkew,
            Self::Dirichlet { .. } => DistributionType::Dirichlet,
        }
    }
}

/// Splits a source into one index set per participant.
///
/// # Errors
/// Fails if there are no participants or classes, if the policy parameters are invalid or if a
/// label of the source is not in `[0, num_classes)`.
pub fn partition<S, R>(
    source: &S,
    num_classes: usize,
    num_participants: usize,
    policy: Policy,
    rng: &mut R,
) -> Result<Vec<IndexSet>, PartitionError>
where
    S: SampleSource + ?Sized,
    R: Rng + ?Sized,
{
    if num_participants == 0 {
        return Err(PartitionError::NoParticipants);
    }
    if num_classes == 0 {
        return Err(PartitionError::NoClasses);
    }
    // revalidate policies which were built by hand
    let policy = match policy {
        Policy::Iid => Policy::Iid,
        Policy::LabelSkew { q } => Policy::new(DistributionType::LabelSkew, q, 0.)?,
        Policy::Dirichlet { alpha } => Policy::new(DistributionType::Dirichlet, 0., alpha)?,
    };

    let shares = match policy {
        Policy::Iid => {
            // labels are still checked so that every policy rejects the same sources
            indices_by_class(source, num_classes)?;
            iid::split(source.len(), num_participants, rng)
        }
        Policy::LabelSkew { q } => {
            let classes = shuffled_classes(source, num_classes, rng)?;
            label_skew::split(&classes, num_participants, q, rng)
        }
        Policy::Dirichlet { alpha } => {
            let classes = shuffled_classes(source, num_classes, rng)?;
            dirichlet::split(&classes, num_participants, alpha, rng)?
        }
    };
    debug!(
        "partitioned {} samples of {} classes across {} participants ({})",
        source.len(),
        num_classes,
        num_participants,
        policy.distribution_type(),
    );

    Ok(shares)
}

/// Groups the indices of a source by class and shuffles every class.
fn shuffled_classes<S, R>(
    source: &S,
    num_classes: usize,
    rng: &mut R,
) -> Result<Vec<Vec<usize>>, SourceError>
where
    S: SampleSource + ?Sized,
    R: Rng + ?Sized,
{
    let mut classes = indices_by_class(source, num_classes)?;
    for class in classes.iter_mut() {
        class.shuffle(rng);
    }
    Ok(classes)
}
