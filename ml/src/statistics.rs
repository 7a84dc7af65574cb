use ndarray::*;
use serde_derive::Serialize;
use std::fmt::Display;

use crate::{ImageArray, ImagePrecision, NUM_CHANNELS};

/// Summary of the value distribution of an image, reported next to every layer output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub mean_rgb: [ImagePrecision; NUM_CHANNELS],
    pub min: ImagePrecision,
    pub max: ImagePrecision,
    /// Share of elements that are exactly zero (after relu or dropout this grows)
    pub zero_fraction: ImagePrecision,
}

impl Statistics {
    pub fn new(image: &ImageArray) -> Statistics {
        if image.is_empty() {
            return Statistics {
                mean_rgb: [0.; NUM_CHANNELS],
                min: 0.,
                max: 0.,
                zero_fraction: 0.,
            };
        }

        let mut mean_rgb = [0.; NUM_CHANNELS];
        for (c, channel) in image.axis_iter(Axis(2)).take(NUM_CHANNELS).enumerate() {
            mean_rgb[c] = channel.sum() / channel.len() as ImagePrecision;
        }
        let min = image.fold(ImagePrecision::INFINITY, |acc, &x| acc.min(x));
        let max = image.fold(ImagePrecision::NEG_INFINITY, |acc, &x| acc.max(x));
        let zeros = image.iter().filter(|x| **x == 0.).count();

        Statistics {
            mean_rgb,
            min,
            max,
            zero_fraction: zeros as ImagePrecision / image.len() as ImagePrecision,
        }
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mean rgb: [{:.3}, {:.3}, {:.3}], min: {:.3}, max: {:.3}, zeros: {:.1}%",
            self.mean_rgb[0],
            self.mean_rgb[1],
            self.mean_rgb[2],
            self.min,
            self.max,
            self.zero_fraction * 100.
        )
    }
}
