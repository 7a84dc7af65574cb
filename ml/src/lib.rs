//! Layer-by-layer image transforms in the spirit of a convolutional neural network.
//!
//! Images are passed around as `(height, width, channel)` arrays with values in `[0, 1]`.
//! Every transform is exposed as a free function and as a small layer struct; the
//! [`pipeline`] module ties them together, applying a list of layer specifications one
//! after another while keeping track of the receptive field.
use ndarray::Array3;

pub mod activation_functions;
pub mod convolutions;
pub mod dropout;
pub mod kernels;
pub mod normalization;
pub mod pipeline;
pub mod pooling;
pub mod receptive_field;
pub mod statistics;

pub type WeightPrecision = f32;
pub type ImagePrecision = f32;

/// Image data in (height, width, channel) layout.
pub type ImageArray = Array3<ImagePrecision>;

/// Shape of an [`ImageArray`] as `[height, width, channels]`.
pub type Shape = [usize; 3];

/// Number of colour channels every pipeline input must have.
pub const NUM_CHANNELS: usize = 3;

pub use pipeline::{
    run_pipeline, Layer, LayerKind, LayerRecord, LayerSpec, Pipeline, PipelineError,
    PipelineResult,
};
pub use receptive_field::ReceptiveField;

/// Returns the shape of the image as `[height, width, channels]`.
pub fn shape_of(image: &ImageArray) -> Shape {
    let (height, width, channels) = image.dim();
    [height, width, channels]
}
