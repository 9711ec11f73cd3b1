//! Sample sources, index sets and participant shares.
//!
//! A [`SampleSource`] is an ordered, fixed-length collection of `(sample, label)` pairs. Sources
//! are never mutated: partitioning produces [`IndexSet`]s and a [`Share`] is a lazy re-indexing
//! view of a source through one of them.

use std::{
    iter::{FromIterator, IntoIterator},
    slice::Iter,
    sync::Arc,
};

use derive_more::{Display, From, Index, Into};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A class label in `[0, num_classes)`.
pub type Label = usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Range and shape errors of sample sources.
pub enum SourceError {
    #[error("index {index} is out of range for a source of length {len}")]
    OutOfRange { index: usize, len: usize },
    #[error("label {label} is out of range for {num_classes} classes")]
    InvalidLabel { label: Label, num_classes: usize },
    #[error("sample has {actual} values but its shape {shape} requires {expected}")]
    ShapeMismatch {
        shape: Shape,
        expected: usize,
        actual: usize,
    },
    #[error("got {samples} samples but {labels} labels")]
    LengthMismatch { samples: usize, labels: usize },
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(fmt = "{}x{}x{}", channels, height, width)]
/// The `channels x height x width` layout of a sample.
pub struct Shape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Gets the number of values of a sample with this shape.
    pub fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A dense input sample, stored channel-major.
pub struct Sample {
    shape: Shape,
    values: Vec<f32>,
}

impl Sample {
    /// Creates a sample from channel-major values.
    ///
    /// # Errors
    /// Fails if the number of values doesn't match the shape.
    pub fn new(shape: Shape, values: Vec<f32>) -> Result<Self, SourceError> {
        if values.len() != shape.numel() {
            return Err(SourceError::ShapeMismatch {
                shape,
                expected: shape.numel(),
                actual: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    /// Creates a sample with all values set to `0`.
    pub fn zeros(shape: Shape) -> Self {
        Self {
            shape,
            values: vec![0.; shape.numel()],
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Gets the channel-major values for in-place edits.
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Gets the value at the given channel, row and column.
    pub fn at(&self, channel: usize, row: usize, col: usize) -> Option<f32> {
        if channel >= self.shape.channels || row >= self.shape.height || col >= self.shape.width {
            return None;
        }
        self.values.get(self.offset(channel, row, col)).copied()
    }

    pub(crate) fn offset(&self, channel: usize, row: usize, col: usize) -> usize {
        (channel * self.shape.height + row) * self.shape.width + col
    }
}

/// An ordered, indexable collection of labeled samples.
///
/// Implementations must be stable: the length and the label at every index never change across
/// reads.
pub trait SampleSource {
    /// Gets the number of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the sample and label at `idx`.
    ///
    /// # Errors
    /// Fails if `idx` is not in `[0, len())`.
    fn get(&self, idx: usize) -> Result<(Sample, Label), SourceError>;

    /// Gets only the label at `idx`.
    ///
    /// Sources should override this when the label is available without materializing the
    /// sample.
    fn label(&self, idx: usize) -> Result<Label, SourceError> {
        self.get(idx).map(|(_, label)| label)
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &S {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, idx: usize) -> Result<(Sample, Label), SourceError> {
        (**self).get(idx)
    }

    fn label(&self, idx: usize) -> Result<Label, SourceError> {
        (**self).label(idx)
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Arc<S> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, idx: usize) -> Result<(Sample, Label), SourceError> {
        (**self).get(idx)
    }

    fn label(&self, idx: usize) -> Result<Label, SourceError> {
        (**self).label(idx)
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, idx: usize) -> Result<(Sample, Label), SourceError> {
        (**self).get(idx)
    }

    fn label(&self, idx: usize) -> Result<Label, SourceError> {
        (**self).label(idx)
    }
}

#[derive(Debug, Clone)]
/// A sample source that keeps all samples in memory.
pub struct InMemorySource {
    samples: Vec<Sample>,
    labels: Vec<Label>,
}

impl InMemorySource {
    /// Creates a source from samples and their labels.
    ///
    /// # Errors
    /// Fails if the number of samples and labels differ.
    pub fn new(samples: Vec<Sample>, labels: Vec<Label>) -> Result<Self, SourceError> {
        if samples.len() != labels.len() {
            return Err(SourceError::LengthMismatch {
                samples: samples.len(),
                labels: labels.len(),
            });
        }
        Ok(Self { samples, labels })
    }

    /// Creates a source of zeroed samples with the given labels.
    pub fn from_labels(shape: Shape, labels: Vec<Label>) -> Self {
        let samples = vec![Sample::zeros(shape); labels.len()];
        Self { samples, labels }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}

impl SampleSource for InMemorySource {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, idx: usize) -> Result<(Sample, Label), SourceError> {
        let label = self.label(idx)?;
        Ok((self.samples[idx].clone(), label))
    }

    fn label(&self, idx: usize) -> Result<Label, SourceError> {
        self.labels
            .get(idx)
            .copied()
            .ok_or(SourceError::OutOfRange {
                index: idx,
                len: self.labels.len(),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, From, Index, Into, Serialize, Deserialize)]
/// An ordered set of positions into a sample source.
pub struct IndexSet(Vec<usize>);

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> Iter<usize> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn get(&self, position: usize) -> Option<usize> {
        self.0.get(position).copied()
    }

    /// Gets the indices of `[0, len)` which are not in this set, in ascending order.
    pub fn complement(&self, len: usize) -> Self {
        let mut taken = vec![false; len];
        for &index in self.0.iter().filter(|&&index| index < len) {
            taken[index] = true;
        }
        (0..len).filter(|&index| !taken[index]).collect()
    }

    pub(crate) fn extend_from_slice(&mut self, indices: &[usize]) {
        self.0.extend_from_slice(indices)
    }

    pub(crate) fn push(&mut self, index: usize) {
        self.0.push(index)
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for IndexSet {
    type Item = usize;
    type IntoIter = std::vec::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = &'a usize;
    type IntoIter = Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone)]
/// A participant's view of a source through an [`IndexSet`].
///
/// Position `i` of the share maps to index `indices[i]` of the underlying source. No data is
/// copied.
pub struct Share<S> {
    source: S,
    indices: IndexSet,
}

impl<S: SampleSource> Share<S> {
    /// Creates a share.
    ///
    /// # Errors
    /// Fails if an index is out of range for the source.
    pub fn new(source: S, indices: IndexSet) -> Result<Self, SourceError> {
        let len = source.len();
        if let Some(&index) = indices.iter().find(|&&index| index >= len) {
            return Err(SourceError::OutOfRange { index, len });
        }
        Ok(Self { source, indices })
    }

    /// Gets the source indices of the share, ordered by position.
    pub fn indices(&self) -> &IndexSet {
        &self.indices
    }

    /// Maps positions into the share to indices into the underlying source.
    ///
    /// # Errors
    /// Fails if a position is out of range for the share.
    pub fn resolve_indices(&self, positions: &IndexSet) -> Result<IndexSet, SourceError> {
        positions.iter().map(|&idx| self.resolve(idx)).collect()
    }

    fn resolve(&self, idx: usize) -> Result<usize, SourceError> {
        self.indices.get(idx).ok_or(SourceError::OutOfRange {
            index: idx,
            len: self.indices.len(),
        })
    }
}

impl<S: SampleSource> SampleSource for Share<S> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, idx: usize) -> Result<(Sample, Label), SourceError> {
        self.source.get(self.resolve(idx)?)
    }

    fn label(&self, idx: usize) -> Result<Label, SourceError> {
        self.source.label(self.resolve(idx)?)
    }
}

/// Groups the indices of a source by their label, in ascending index order.
///
/// # Errors
/// Fails if a label is not in `[0, num_classes)`.
pub fn indices_by_class<S>(source: &S, num_classes: usize) -> Result<Vec<Vec<usize>>, SourceError>
where
    S: SampleSource + ?Sized,
{
    let mut classes = vec![Vec::new(); num_classes];
    for idx in 0..source.len() {
        let label = checked_label(source.label(idx)?, num_classes)?;
        classes[label].push(idx);
    }
    Ok(classes)
}

/// Counts the labels of a source.
///
/// # Errors
/// Fails if a label is not in `[0, num_classes)`.
pub fn label_histogram<S>(source: &S, num_classes: usize) -> Result<Vec<usize>, SourceError>
where
    S: SampleSource + ?Sized,
{
    let mut counts = vec![0; num_classes];
    for idx in 0..source.len() {
        counts[checked_label(source.label(idx)?, num_classes)?] += 1;
    }
    Ok(counts)
}

pub(crate) fn checked_label(label: Label, num_classes: usize) -> Result<Label, SourceError> {
    if label < num_classes {
        Ok(label)
    } else {
        Err(SourceError::InvalidLabel { label, num_classes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> InMemorySource {
        InMemorySource::from_labels(Shape::new(1, 2, 2), vec![0, 1, 0, 2, 1])
    }

    #[test]
    fn test_sample_new() {
        let shape = Shape::new(1, 2, 2);
        assert!(Sample::new(shape, vec![0.; 4]).is_ok());
        assert_eq!(
            Sample::new(shape, vec![0.; 3]).unwrap_err(),
            SourceError::ShapeMismatch {
                shape,
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_sample_at() {
        let sample = Sample::new(Shape::new(2, 1, 2), vec![1., 2., 3., 4.]).unwrap();
        assert_eq!(sample.at(0, 0, 1), Some(2.));
        assert_eq!(sample.at(1, 0, 0), Some(3.));
        assert_eq!(sample.at(2, 0, 0), None);
    }

    #[test]
    fn test_in_memory_source() {
        let source = source();
        assert_eq!(source.len(), 5);
        assert_eq!(source.label(3), Ok(2));
        assert_eq!(
            source.get(5).unwrap_err(),
            SourceError::OutOfRange { index: 5, len: 5 }
        );
        assert!(InMemorySource::new(vec![Sample::zeros(Shape::new(1, 1, 1))], vec![]).is_err());
    }

    #[test]
    fn test_share() {
        let source = source();
        let share = Share::new(&source, vec![3, 1].into()).unwrap();
        assert_eq!(share.len(), 2);
        assert_eq!(share.label(0), Ok(2));
        assert_eq!(share.label(1), Ok(1));
        assert_eq!(
            share.label(2).unwrap_err(),
            SourceError::OutOfRange { index: 2, len: 2 }
        );
        assert_eq!(
            Share::new(&source, vec![0, 7].into()).unwrap_err(),
            SourceError::OutOfRange { index: 7, len: 5 }
        );
    }

    #[test]
    fn test_share_resolve_indices() {
        let source = source();
        let share = Share::new(&source, vec![4, 0, 2].into()).unwrap();
        assert_eq!(share.indices().as_slice(), &[4, 0, 2]);
        assert_eq!(
            share.resolve_indices(&IndexSet::from(vec![2, 0])),
            Ok(IndexSet::from(vec![2, 4]))
        );
        assert_eq!(
            share.resolve_indices(&IndexSet::from(vec![3])),
            Err(SourceError::OutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn test_index_set_complement() {
        let root = IndexSet::from(vec![3, 0, 9]);
        assert_eq!(root.complement(6), IndexSet::from(vec![1, 2, 4, 5]));
        assert_eq!(IndexSet::new().complement(2), IndexSet::from(vec![0, 1]));
        assert!(IndexSet::from(vec![1, 0]).complement(2).is_empty());
    }

    #[test]
    fn test_indices_by_class() {
        let classes = indices_by_class(&source(), 3).unwrap();
        assert_eq!(classes, vec![vec![0, 2], vec![1, 4], vec![3]]);
        assert_eq!(
            indices_by_class(&source(), 2).unwrap_err(),
            SourceError::InvalidLabel {
                label: 2,
                num_classes: 2
            }
        );
    }

    #[test]
    fn test_label_histogram() {
        assert_eq!(label_histogram(&source(), 4).unwrap(), vec![2, 2, 1, 0]);
    }
}
