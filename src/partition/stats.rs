//! Label distribution statistics of a partition.

use tracing::info;

use crate::source::{label_histogram, IndexSet, SampleSource, Share, SourceError};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Per-participant label histograms.
pub struct PartitionStats {
    histograms: Vec<Vec<usize>>,
}

impl PartitionStats {
    /// Counts the labels of every participant's share.
    ///
    /// # Errors
    /// Fails if an index is out of range or a label is not in `[0, num_classes)`.
    pub fn new<S>(source: &S, num_classes: usize, shares: &[IndexSet]) -> Result<Self, SourceError>
    where
        S: SampleSource + ?Sized,
    {
        let histograms = shares
            .iter()
            .map(|indices| {
                let share = Share::new(source, indices.clone())?;
                label_histogram(&share, num_classes)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { histograms })
    }

    /// Gets the label histogram of a participant.
    pub fn participant(&self, participant: usize) -> Option<&[usize]> {
        self.histograms.get(participant).map(Vec::as_slice)
    }

    /// Gets the number of samples of every class summed over all participants.
    pub fn class_totals(&self) -> Vec<usize> {
        let num_classes = self.histograms.first().map_or(0, Vec::len);
        (0..num_classes)
            .map(|class| self.histograms.iter().map(|h| h[class]).sum())
            .collect()
    }

    /// Gets the share size of every participant.
    pub fn share_sizes(&self) -> Vec<usize> {
        self.histograms.iter().map(|h| h.iter().sum()).collect()
    }

    /// Logs the label distribution of every participant.
    pub fn log(&self) {
        for (participant, histogram) in self.histograms.iter().enumerate() {
            info!(
                "participant {}: {} samples, label distribution: {:?}",
                participant,
                histogram.iter().sum::<usize>(),
                histogram,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemorySource, Shape};

    #[test]
    fn test_stats() {
        let source = InMemorySource::from_labels(Shape::new(1, 1, 1), vec![0, 1, 1, 2, 0, 2]);
        let shares = vec![
            IndexSet::from(vec![0, 1, 2]),
            IndexSet::new(),
            IndexSet::from(vec![3, 4, 5]),
        ];
        let stats = PartitionStats::new(&source, 3, &shares).unwrap();
        assert_eq!(stats.participant(0), Some(&[1, 2, 0][..]));
        assert_eq!(stats.participant(1), Some(&[0, 0, 0][..]));
        assert_eq!(stats.participant(2), Some(&[1, 0, 2][..]));
        assert_eq!(stats.participant(3), None);
        assert_eq!(stats.class_totals(), vec![2, 2, 2]);
        assert_eq!(stats.share_sizes(), vec![3, 0, 3]);
    }

    #[test]
    fn test_stats_out_of_range() {
        let source = InMemorySource::from_labels(Shape::new(1, 1, 1), vec![0, 1]);
        let shares = vec![IndexSet::from(vec![0, 2])];
        assert_eq!(
            PartitionStats::new(&source, 2, &shares),
            Err(SourceError::OutOfRange { index: 2, len: 2 })
        );
    }
}
