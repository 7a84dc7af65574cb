//! Batch-norm style normalization of a single image.
//!
//! Unlike real batch normalization the statistics come from the one image being
//! processed: every channel is shifted to zero mean and scaled by its spatial
//! standard deviation. There are no learned scale or shift parameters.
use ndarray::*;

use crate::{ImageArray, ImagePrecision};

/// Added to the standard deviation so constant channels do not divide by zero.
pub const EPSILON: ImagePrecision = 1e-8;

/// Mean and standard deviation of one channel.
///
/// The standard deviation is Bessel corrected (divides by `n - 1`) as long as the
/// channel has more than one element, which matches what tensor libraries report
/// by default. A single element has a deviation of 0.
fn channel_moments(channel: ArrayView2<ImagePrecision>) -> (ImagePrecision, ImagePrecision) {
    let n = channel.len();
    if n == 0 {
        return (0., 0.);
    }
    let mean = channel.sum() / n as ImagePrecision;
    if n == 1 {
        return (mean, 0.);
    }
    let squared_deviations = channel.fold(0., |acc: ImagePrecision, &x| acc + (x - mean).powi(2));
    (mean, (squared_deviations / (n - 1) as ImagePrecision).sqrt())
}

/// Normalizes every channel by `(x - mean) / (std + EPSILON)`.
pub fn batch_norm<'a, V>(im: V) -> ImageArray
where
    V: AsArray<'a, ImagePrecision, Ix3>,
{
    let im: ArrayView3<ImagePrecision> = im.into();
    let (means, stds): (Vec<_>, Vec<_>) = im.axis_iter(Axis(2)).map(channel_moments).unzip();
    let means = Array1::from(means);
    let scales = Array1::from(stds) + EPSILON;

    // (height, width, channel) broadcasts against (channel,)
    (&im - &means) / &scales
}

/// Normalization layer, see [`batch_norm`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizationLayer {}

impl NormalizationLayer {
    pub fn new() -> Self {
        Self {}
    }

    pub fn normalize(&self, x: &ImageArray) -> ImageArray {
        batch_norm(x)
    }
}
