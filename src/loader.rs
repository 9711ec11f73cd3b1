//! Dataset loading.
//!
//! Acquiring and decoding real datasets happens outside of this crate. A [`DatasetLoader`] hands
//! the train and test sources of a named dataset over to the partitioning and poisoning
//! machinery, which treats them as opaque [`SampleSource`]s.
//!
//! The [`SyntheticLoader`] stands in for a real loader. It produces balanced in-memory sources
//! with the shapes and label spaces of the known datasets and uniformly random pixels.

use std::str::FromStr;

use derive_more::Display;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::source::{InMemorySource, Sample, SampleSource, Shape, SourceError};

#[derive(Debug, Error, PartialEq)]
/// Errors of dataset loading.
pub enum LoadError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// The sources of a loaded dataset.
#[derive(Debug, Clone)]
pub struct LoadedDataset<S> {
    pub train: S,
    pub test: S,
    pub num_classes: usize,
    pub input_channels: usize,
}

/// A loader of named datasets.
pub trait DatasetLoader {
    type Source: SampleSource;

    /// Loads the train and test sources of a dataset.
    ///
    /// # Errors
    /// Fails if the dataset is unknown or can't be loaded.
    fn load(&self, name: &str) -> Result<LoadedDataset<Self::Source>, LoadError>;
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A known dataset.
pub enum DatasetName {
    #[display(fmt = "MNIST")]
    Mnist,
    #[display(fmt = "CIFAR10")]
    Cifar10,
}

impl DatasetName {
    /// Gets the shape of a sample.
    pub fn shape(&self) -> Shape {
        match self {
            Self::Mnist => Shape::new(1, 28, 28),
            Self::Cifar10 => Shape::new(3, 32, 32),
        }
    }

    pub fn num_classes(&self) -> usize {
        10
    }
}

impl FromStr for DatasetName {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mnist" => Ok(Self::Mnist),
            "cifar10" | "cifar-10" => Ok(Self::Cifar10),
            _ => Err(LoadError::UnknownDataset(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A loader of synthetic stand-ins for the known datasets.
pub struct SyntheticLoader {
    /// The number of training samples per class.
    pub train_per_class: usize,
    /// The number of test samples per class.
    pub test_per_class: usize,
    /// The seed of the generated pixels and label order.
    pub seed: u64,
}

impl SyntheticLoader {
    fn generate<R: Rng>(
        shape: Shape,
        num_classes: usize,
        per_class: usize,
        rng: &mut R,
    ) -> Result<InMemorySource, SourceError> {
        let mut labels = (0..num_classes)
            .flat_map(|class| std::iter::repeat(class).take(per_class))
            .collect::<Vec<_>>();
        labels.shuffle(rng);
        let samples = labels
            .iter()
            .map(|_| {
                let values = (0..shape.numel()).map(|_| rng.gen::<f32>()).collect();
                Sample::new(shape, values)
            })
            .collect::<Result<Vec<_>, _>>()?;
        InMemorySource::new(samples, labels)
    }
}

impl DatasetLoader for SyntheticLoader {
    type Source = InMemorySource;

    fn load(&self, name: &str) -> Result<LoadedDataset<InMemorySource>, LoadError> {
        let dataset = name.parse::<DatasetName>()?;
        let shape = dataset.shape();
        let num_classes = dataset.num_classes();
        info!("loading synthetic {} dataset", dataset);

        let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
        let train = Self::generate(shape, num_classes, self.train_per_class, &mut rng)?;
        let test = Self::generate(shape, num_classes, self.test_per_class, &mut rng)?;
        info!(
            "dataset loaded: {} training samples, {} test samples, {} classes, {} input channels",
            train.len(),
            test.len(),
            num_classes,
            shape.channels,
        );

        Ok(LoadedDataset {
            train,
            test,
            num_classes,
            input_channels: shape.channels,
        })
    }
}
