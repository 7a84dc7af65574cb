//! Dropout-like random masking.
//!
//! The random source is always passed in by the caller, so seeding it makes the
//! layer deterministic.
use ndarray::*;
use rand::Rng;

use crate::{ImageArray, ImagePrecision};

pub const DEFAULT_DROPOUT_RATE: f64 = 0.1;

/// Zeroes every element with probability `rate`. An element survives when a fresh
/// uniform draw from `[0, 1)` is strictly greater than `rate`.
///
/// A rate of 0 returns the values unchanged without consuming any randomness.
pub fn dropout<'a, V, R>(im: V, rate: f64, rng: &mut R) -> ImageArray
where
    V: AsArray<'a, ImagePrecision, Ix3>,
    R: Rng,
{
    let im: ArrayView3<ImagePrecision> = im.into();
    if rate <= 0. {
        return im.to_owned();
    }
    im.mapv(|x| if rng.gen::<f64>() > rate { x } else { 0. })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropoutLayer {
    rate: f64,
}

impl DropoutLayer {
    pub fn new(rate: f64) -> Self {
        debug_assert!((0. ..1.).contains(&rate), "Dropout rate outside [0, 1)");
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn apply<R: Rng>(&self, x: &ImageArray, rng: &mut R) -> ImageArray {
        dropout(x, self.rate, rng)
    }
}
