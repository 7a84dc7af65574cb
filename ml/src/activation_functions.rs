//! Activation functions, exposed as a layer as well as a free function.
use ndarray::*;

use crate::{ImageArray, ImagePrecision};

/// Relu implementation
pub fn relu<S, D>(data: &ArrayBase<S, D>) -> Array<ImagePrecision, D>
where
    S: Data<Elem = ImagePrecision>,
    D: Dimension,
{
    data.mapv(|x| x.max(0.))
}

/// Relu implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReluLayer {}

impl ReluLayer {
    pub fn new() -> Self {
        Self {}
    }

    pub fn activate(&self, x: &ImageArray) -> ImageArray {
        relu(x)
    }
}
