//! Label skew partitioning.
//!
//! See the [partition module] documentation since this is a private module anyways.
//!
//! [partition module]: crate::partition

use std::ops::Range;

use rand::Rng;

use crate::source::IndexSet;

/// Gets the participants which prefer a class.
///
/// Classes are mapped round-robin onto single participants, class `c` is preferred by participant
/// `c mod num_participants`. With fewer participants than classes several classes share a
/// participant, with more participants than classes the surplus participants prefer no class.
/// The range is empty if there are no participants or no classes.
pub fn preferred_participants(
    class: usize,
    num_classes: usize,
    num_participants: usize,
) -> Range<usize> {
    if num_participants == 0 || num_classes == 0 {
        return 0..0;
    }
    let start = class % num_participants;
    start..start + 1
}

/// Assigns every sample of a class to a preferred participant with probability `q`, and to one
/// of the other participants otherwise.
///
/// Samples fall back to a preferred participant if every participant is preferred.
pub fn split<R>(classes: &[Vec<usize>], num_participants: usize, q: f64, rng: &mut R) -> Vec<IndexSet>
where
    R: Rng + ?Sized,
{
    let mut shares = vec![IndexSet::new(); num_participants];
    for (class, indices) in classes.iter().enumerate() {
        let preferred = preferred_participants(class, classes.len(), num_participants);
        let others = (0..num_participants)
            .filter(|participant| !preferred.contains(participant))
            .collect::<Vec<_>>();

        for &idx in indices {
            let participant = if rng.gen::<f64>() < q || others.is_empty() {
                rng.gen_range(preferred.clone())
            } else {
                others[rng.gen_range(0..others.len())]
            };
            shares[participant].push(idx);
        }
    }
    shares
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn classes(num_classes: usize, per_class: usize) -> Vec<Vec<usize>> {
        (0..num_classes)
            .map(|c| (0..per_class).map(|i| i * num_classes + c).collect())
            .collect()
    }

    #[test]
    fn test_preferred_participants_fewer_participants() {
        assert_eq!(preferred_participants(0, 10, 4), 0..1);
        assert_eq!(preferred_participants(3, 10, 4), 3..4);
        assert_eq!(preferred_participants(5, 10, 4), 1..2);
    }

    #[test]
    fn test_preferred_participants_more_participants() {
        assert_eq!(preferred_participants(0, 10, 20), 0..1);
        assert_eq!(preferred_participants(9, 10, 20), 9..10);
        assert_eq!(preferred_participants(2, 3, 7), 2..3);
        assert_eq!(preferred_participants(1, 2, 2), 1..2);
    }

    #[test]
    fn test_preferred_participants_degenerate() {
        assert_eq!(preferred_participants(0, 3, 0), 0..0);
        assert_eq!(preferred_participants(2, 0, 4), 0..0);
    }

    #[test]
    fn test_split_surplus_participants_get_no_preferred_samples() {
        let classes = classes(10, 20);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let shares = split(&classes, 20, 1., &mut rng);
        assert!(shares[..10].iter().all(|share| share.len() == 20));
        assert!(shares[10..].iter().all(IndexSet::is_empty));
    }

    #[test]
    fn test_split_q_one_only_preferred() {
        let classes = classes(4, 25);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let shares = split(&classes, 8, 1., &mut rng);
        for (participant, share) in shares.iter().enumerate() {
            for &idx in share {
                let preferred = preferred_participants(idx % 4, 4, 8);
                assert!(preferred.contains(&participant));
            }
        }
    }

    #[test]
    fn test_split_q_zero_never_preferred() {
        let classes = classes(3, 30);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let shares = split(&classes, 5, 0., &mut rng);
        for (participant, share) in shares.iter().enumerate() {
            for &idx in share {
                let preferred = preferred_participants(idx % 3, 3, 5);
                assert!(!preferred.contains(&participant));
            }
        }
    }

    #[test]
    fn test_split_single_participant() {
        let classes = classes(3, 4);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let shares = split(&classes, 1, 0., &mut rng);
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].len(), 12);
    }
}
