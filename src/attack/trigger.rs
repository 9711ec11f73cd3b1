//! Backdoor trigger patterns.
//!
//! See the [attack module] documentation since this is a private module anyways.
//!
//! [attack module]: crate::attack

use num::clamp;
use serde::{Deserialize, Serialize};

use crate::source::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// A square high-intensity patch in the bottom-right corner of every channel.
pub struct Trigger {
    /// The side length of the patch in pixels.
    pub size: usize,
    /// The value added to every pixel of the patch.
    pub intensity: f32,
}

impl Default for Trigger {
    fn default() -> Self {
        Self {
            size: 4,
            intensity: 1.,
        }
    }
}

impl Trigger {
    /// Stamps the trigger onto a sample and clamps all values into `[0, 1]`.
    ///
    /// Patches larger than the sample cover the whole sample.
    pub fn apply(&self, sample: &mut Sample) {
        let shape = sample.shape();
        let rows = shape.height.saturating_sub(self.size)..shape.height;
        let cols = shape.width.saturating_sub(self.size)..shape.width;
        for channel in 0..shape.channels {
            for row in rows.clone() {
                for col in cols.clone() {
                    let offset = sample.offset(channel, row, col);
                    sample.values_mut()[offset] += self.intensity;
                }
            }
        }
        for value in sample.values_mut() {
            *value = clamp(*value, 0., 1.);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Shape;

    #[test]
    fn test_apply_patches_bottom_right_corner() {
        let mut sample = Sample::new(Shape::new(1, 28, 28), vec![0.25; 784]).unwrap();
        Trigger::default().apply(&mut sample);
        assert_eq!(sample.at(0, 24, 24), Some(1.));
        assert_eq!(sample.at(0, 27, 27), Some(1.));
        assert_eq!(sample.at(0, 23, 27), Some(0.25));
        assert_eq!(sample.at(0, 27, 23), Some(0.25));
        assert_eq!(sample.values().iter().filter(|&&v| v == 1.).count(), 16);
    }

    #[test]
    fn test_apply_every_channel() {
        let mut sample = Sample::zeros(Shape::new(3, 8, 8));
        Trigger {
            size: 2,
            intensity: 0.5,
        }
        .apply(&mut sample);
        for channel in 0..3 {
            assert_eq!(sample.at(channel, 7, 7), Some(0.5));
            assert_eq!(sample.at(channel, 5, 7), Some(0.));
        }
    }

    #[test]
    fn test_apply_clamps_values() {
        let mut sample = Sample::new(Shape::new(1, 2, 2), vec![-0.5, 0.5, 2., 0.9]).unwrap();
        Trigger {
            size: 1,
            intensity: 1.,
        }
        .apply(&mut sample);
        assert_eq!(sample.values(), &[0., 0.5, 1., 1.]);
    }

    #[test]
    fn test_apply_oversized_patch() {
        let mut sample = Sample::zeros(Shape::new(1, 2, 3));
        Trigger::default().apply(&mut sample);
        assert!(sample.values().iter().all(|&v| v == 1.));
    }
}
