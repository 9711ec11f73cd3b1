#![cfg_attr(docsrs, feature(doc_cfg))]
//! # Xaynet datasim: simulated participant data for federated learning
//!
//! ###### tags: Xayn, Federated Learning, Data Poisoning, Non-IID
//!
//! Experiments with federated learning need more than a dataset. The samples have to be spread
//! across simulated participants, often in a heterogeneous way, some participants may behave
//! maliciously and the coordinator may hold a small trusted root set of its own. This crate
//! provides these building blocks on top of any indexable source of labeled samples.
//!
//! ## Overview
//!
//! - [`source`]: the [`SampleSource`] abstraction, index sets and participant shares.
//! - [`partition`]: splitting a source across participants with the `iid`, `label_skew` and
//!   `dirichlet` distributions.
//! - [`attack`]: wrapping a participant share into a [`PoisonedSource`] which corrupts labels
//!   and optionally data on every read.
//! - [`root`]: selecting a possibly class-biased root set.
//! - [`loader`]: loading the train and test sources of a named dataset.
//! - [`settings`]: configuration of a whole simulation run.
//!
//! All randomness is drawn from generators handed in by the caller. Equal seeds therefore
//! reproduce equal partitions, root sets and corruptions.
//!
//! ## Example
//! ```
//! # use rand::SeedableRng;
//! # use rand_chacha::ChaCha20Rng;
//! use xaynet_datasim::{
//!     attack::{Attack, PoisonedSource},
//!     partition::{partition, Policy},
//!     source::{InMemorySource, SampleSource, Shape, Share},
//! };
//!
//! let labels = (0..100).map(|i| i % 10).collect();
//! let source = InMemorySource::from_labels(Shape::new(1, 28, 28), labels);
//! let mut rng = ChaCha20Rng::seed_from_u64(0);
//!
//! let shares = partition(&source, 10, 4, Policy::LabelSkew { q: 0.5 }, &mut rng).unwrap();
//! assert_eq!(shares.len(), 4);
//!
//! let share = Share::new(&source, shares[0].clone()).unwrap();
//! let malicious = PoisonedSource::new(share, 10, &Attack::MinMax, &mut rng).unwrap();
//! assert_eq!(malicious.len(), shares[0].len());
//! ```

pub mod attack;
pub mod loader;
pub mod partition;
pub mod root;
pub mod settings;
pub mod source;

pub use self::{
    attack::{Attack, AttackError, PoisonedSource},
    partition::{partition, PartitionError, Policy},
    root::{select_root, RootSetError},
    source::{IndexSet, Label, Sample, SampleSource, Share, SourceError},
};
