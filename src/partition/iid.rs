//! IID partitioning.
//!
//! See the [partition module] documentation since this is a private module anyways.
//!
//! [partition module]: crate::partition

use rand::{seq::SliceRandom, Rng};

use crate::source::IndexSet;

/// Shuffles all indices and cuts them into contiguous blocks.
///
/// Every block holds `len / num_participants` indices, and the last `len % num_participants`
/// blocks take one more each.
pub fn split<R>(len: usize, num_participants: usize, rng: &mut R) -> Vec<IndexSet>
where
    R: Rng + ?Sized,
{
    let mut indices = (0..len).collect::<Vec<_>>();
    indices.shuffle(rng);

    let base = len / num_participants;
    let first_larger = num_participants - len % num_participants;
    let mut start = 0;
    (0..num_participants)
        .map(|participant| {
            let size = if participant >= first_larger {
                base + 1
            } else {
                base
            };
            let block = indices[start..start + size].to_vec();
            start += size;
            IndexSet::from(block)
        })
        .collect()
}
