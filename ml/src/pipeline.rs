//! Applies a list of layer specifications to an image, one layer after another.
//!
//! Specifications arrive untyped (usually as JSON), are validated into [`Layer`]s and
//! then run strictly in order: every layer consumes the output of the previous one.
//! After every layer the values are clipped to `[0, 1]` and the receptive field is
//! updated for sliding window layers. A run either produces one [`LayerRecord`] per
//! layer or fails as a whole.
use std::{convert::TryFrom, fmt::Display};

use log::debug;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    activation_functions::ReluLayer,
    convolutions::{output_size, ConvolutionLayer},
    dropout::{DropoutLayer, DEFAULT_DROPOUT_RATE},
    normalization::NormalizationLayer,
    pooling::{PoolingKind, PoolingLayer},
    receptive_field::ReceptiveField,
    shape_of, ImageArray, Shape, NUM_CHANNELS,
};

pub const DEFAULT_KERNEL_NAME: &str = "default";
pub const DEFAULT_CONV_STRIDE: usize = 1;
pub const DEFAULT_CONV_PADDING: usize = 1;
pub const DEFAULT_POOL_SIZE: usize = 2;
pub const DEFAULT_POOL_PADDING: usize = 0;

/// 2^53, the bound below which every integral f64 is exact.
const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_992.;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Unknown layer type: {layer_type:?} (layer {index})")]
    InvalidLayerType { index: usize, layer_type: String },
    #[error("Layer {index} ({layer_type}): invalid {parameter}, {reason}")]
    MalformedParameter {
        index: usize,
        layer_type: LayerKind,
        parameter: &'static str,
        reason: String,
    },
    #[error("Layer {index} ({layer_type}): a {kernel_size}x{kernel_size} window with padding {padding} does not fit a {height}x{width} input")]
    KernelLargerThanInput {
        index: usize,
        layer_type: LayerKind,
        kernel_size: usize,
        padding: usize,
        height: usize,
        width: usize,
    },
    #[error("Layer {index} ({layer_type}): the receptive field grows beyond the representable range")]
    ReceptiveFieldOverflow { index: usize, layer_type: LayerKind },
    #[error("Invalid input image: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Index of the layer that caused the error, if a layer did.
    pub fn layer_index(&self) -> Option<usize> {
        match self {
            PipelineError::InvalidLayerType { index, .. }
            | PipelineError::MalformedParameter { index, .. }
            | PipelineError::KernelLargerThanInput { index, .. }
            | PipelineError::ReceptiveFieldOverflow { index, .. } => Some(*index),
            PipelineError::InvalidInput(_) => None,
        }
    }
}

/// The six kinds of layers a pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Conv,
    #[serde(rename = "maxpool")]
    MaxPool,
    #[serde(rename = "avgpool")]
    AvgPool,
    Relu,
    #[serde(rename = "batchnorm")]
    BatchNorm,
    Dropout,
}

impl LayerKind {
    pub fn from_name(name: &str) -> Option<LayerKind> {
        match name {
            "conv" => Some(LayerKind::Conv),
            "maxpool" => Some(LayerKind::MaxPool),
            "avgpool" => Some(LayerKind::AvgPool),
            "relu" => Some(LayerKind::Relu),
            "batchnorm" => Some(LayerKind::BatchNorm),
            "dropout" => Some(LayerKind::Dropout),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Conv => "conv",
            LayerKind::MaxPool => "maxpool",
            LayerKind::AvgPool => "avgpool",
            LayerKind::Relu => "relu",
            LayerKind::BatchNorm => "batchnorm",
            LayerKind::Dropout => "dropout",
        }
    }
}

impl Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Untyped description of one layer, as supplied by a client.
///
/// Only the parameters relevant to `layer_type` are looked at, the rest is ignored.
/// Missing parameters take the defaults of the respective layer. Parameters are kept
/// as raw JSON values, so a wrongly typed one is reported for its layer instead of
/// failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(rename = "type", default)]
    pub layer_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_size: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropout_rate: Option<Value>,
}

impl LayerSpec {
    pub fn new(layer_type: &str) -> Self {
        Self {
            layer_type: layer_type.to_string(),
            ..Self::default()
        }
    }

    pub fn conv(kernel_type: &str) -> Self {
        Self::new("conv").with_kernel_type(kernel_type)
    }

    pub fn with_kernel_type(mut self, kernel_type: &str) -> Self {
        self.kernel_type = Some(kernel_type.to_string());
        self
    }

    pub fn with_stride(mut self, stride: i64) -> Self {
        self.stride = Some(stride.into());
        self
    }

    pub fn with_padding(mut self, padding: i64) -> Self {
        self.padding = Some(padding.into());
        self
    }

    pub fn with_kernel_size(mut self, kernel_size: i64) -> Self {
        self.kernel_size = Some(kernel_size.into());
        self
    }

    pub fn with_dropout_rate(mut self, dropout_rate: f64) -> Self {
        self.dropout_rate = Some(dropout_rate.into());
        self
    }
}

/// Reads the parameters of one spec, producing errors that point at the spec.
struct SpecReader<'a> {
    index: usize,
    kind: LayerKind,
    spec: &'a LayerSpec,
}

impl<'a> SpecReader<'a> {
    fn malformed(&self, parameter: &'static str, reason: String) -> PipelineError {
        PipelineError::MalformedParameter {
            index: self.index,
            layer_type: self.kind,
            parameter,
            reason,
        }
    }

    /// Reads an integer parameter. Integral floats such as `2.0` are accepted.
    fn integer(&self, parameter: &'static str, value: Option<&Value>) -> PipelineResult<Option<i64>> {
        let value = match value {
            None => return Ok(None),
            Some(value) => value,
        };
        if let Some(v) = value.as_i64() {
            return Ok(Some(v));
        }
        if value.as_u64().is_some() {
            return Err(self.malformed(parameter, format!("{} is too large", value)));
        }
        match value.as_f64() {
            // larger floats are not exact integers anymore
            Some(v) if v.fract() == 0. && v.abs() < MAX_EXACT_FLOAT_INTEGER => Ok(Some(v as i64)),
            _ => Err(self.malformed(parameter, format!("must be an integer, got {}", value))),
        }
    }

    /// Converts a validated parameter, rejecting values too large to index with.
    fn size(&self, parameter: &'static str, value: i64) -> PipelineResult<usize> {
        isize::try_from(value)
            .map(|v| v as usize)
            .map_err(|_| self.malformed(parameter, format!("{} is too large", value)))
    }

    fn positive(
        &self,
        parameter: &'static str,
        value: Option<&Value>,
        default: usize,
    ) -> PipelineResult<usize> {
        match self.integer(parameter, value)? {
            None => Ok(default),
            Some(v) if v > 0 => self.size(parameter, v),
            Some(v) => Err(self.malformed(parameter, format!("must be positive, got {}", v))),
        }
    }

    fn non_negative(
        &self,
        parameter: &'static str,
        value: Option<&Value>,
        default: usize,
    ) -> PipelineResult<usize> {
        match self.integer(parameter, value)? {
            None => Ok(default),
            Some(v) if v >= 0 => self.size(parameter, v),
            Some(v) => Err(self.malformed(parameter, format!("must not be negative, got {}", v))),
        }
    }

    fn rate(&self, parameter: &'static str, value: Option<&Value>, default: f64) -> PipelineResult<f64> {
        let rate = match value {
            None => default,
            Some(value) => value.as_f64().ok_or_else(|| {
                self.malformed(parameter, format!("must be a number, got {}", value))
            })?,
        };
        if rate.is_finite() && (0. ..1.).contains(&rate) {
            Ok(rate)
        } else {
            Err(self.malformed(parameter, format!("must lie in [0, 1), got {}", rate)))
        }
    }

    fn pooling(&self, kind: PoolingKind) -> PipelineResult<Layer> {
        let spec = self.spec;
        let kernel_size = self.positive("kernel_size", spec.kernel_size.as_ref(), DEFAULT_POOL_SIZE)?;
        let stride = self.positive("stride", spec.stride.as_ref(), kernel_size)?;
        let padding = self.non_negative("padding", spec.padding.as_ref(), DEFAULT_POOL_PADDING)?;
        Ok(Layer::Pooling(PoolingLayer::new(
            kind,
            kernel_size,
            stride,
            padding,
        )))
    }

    fn layer(&self) -> PipelineResult<Layer> {
        let spec = self.spec;
        let layer = match self.kind {
            LayerKind::Conv => {
                let kernel_name = spec.kernel_type.as_deref().unwrap_or(DEFAULT_KERNEL_NAME);
                let stride = self.positive("stride", spec.stride.as_ref(), DEFAULT_CONV_STRIDE)?;
                let padding =
                    self.non_negative("padding", spec.padding.as_ref(), DEFAULT_CONV_PADDING)?;
                Layer::Convolution(ConvolutionLayer::from_kernel_name(
                    kernel_name,
                    stride,
                    padding,
                ))
            }
            LayerKind::MaxPool => self.pooling(PoolingKind::Max)?,
            LayerKind::AvgPool => self.pooling(PoolingKind::Average)?,
            LayerKind::Relu => Layer::Relu(ReluLayer::new()),
            LayerKind::BatchNorm => Layer::Normalization(NormalizationLayer::new()),
            LayerKind::Dropout => {
                let rate = self.rate("dropout_rate", spec.dropout_rate.as_ref(), DEFAULT_DROPOUT_RATE)?;
                Layer::Dropout(DropoutLayer::new(rate))
            }
        };
        Ok(layer)
    }
}

/// A validated layer, ready to be applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Convolution(ConvolutionLayer),
    Pooling(PoolingLayer),
    Relu(ReluLayer),
    Normalization(NormalizationLayer),
    Dropout(DropoutLayer),
}

impl Layer {
    /// Validates the spec at position `index` of a pipeline.
    pub fn from_spec(index: usize, spec: &LayerSpec) -> PipelineResult<Layer> {
        let kind = LayerKind::from_name(&spec.layer_type).ok_or_else(|| {
            PipelineError::InvalidLayerType {
                index,
                layer_type: spec.layer_type.clone(),
            }
        })?;
        SpecReader { index, kind, spec }.layer()
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Convolution(_) => LayerKind::Conv,
            Layer::Pooling(p) => match p.kind() {
                PoolingKind::Max => LayerKind::MaxPool,
                PoolingKind::Average => LayerKind::AvgPool,
            },
            Layer::Relu(_) => LayerKind::Relu,
            Layer::Normalization(_) => LayerKind::BatchNorm,
            Layer::Dropout(_) => LayerKind::Dropout,
        }
    }

    /// Kernel size, stride and padding of sliding window layers.
    pub fn window(&self) -> Option<(usize, usize, usize)> {
        match self {
            Layer::Convolution(c) => Some((c.kernel_size(), c.stride(), c.padding())),
            Layer::Pooling(p) => Some((p.kernel_size(), p.stride(), p.padding())),
            _ => None,
        }
    }

    /// Checks that the layer can be applied to an input of the given shape.
    ///
    /// Padding may not exceed the smaller side of the input, which bounds the padded
    /// image to nine times the input size.
    fn check_fits(&self, index: usize, input_shape: Shape) -> PipelineResult<()> {
        if let Some((kernel_size, stride, padding)) = self.window() {
            let [height, width, _] = input_shape;
            if padding > height.min(width) {
                return Err(PipelineError::MalformedParameter {
                    index,
                    layer_type: self.kind(),
                    parameter: "padding",
                    reason: format!(
                        "{} exceeds the smaller side of the {}x{} input",
                        padding, height, width
                    ),
                });
            }
            let fits = output_size(height, kernel_size, stride, padding).is_some()
                && output_size(width, kernel_size, stride, padding).is_some();
            if !fits {
                return Err(PipelineError::KernelLargerThanInput {
                    index,
                    layer_type: self.kind(),
                    kernel_size,
                    padding,
                    height,
                    width,
                });
            }
        }
        Ok(())
    }

    /// Applies the layer without clipping the result.
    pub fn apply<R: Rng>(&self, input: &ImageArray, rng: &mut R) -> ImageArray {
        match self {
            Layer::Convolution(c) => c.convolve(input),
            Layer::Pooling(p) => p.pool(input),
            Layer::Relu(r) => r.activate(input),
            Layer::Normalization(n) => n.normalize(input),
            Layer::Dropout(d) => d.apply(input, rng),
        }
    }
}

/// Output of one layer of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {
    pub layer_index: usize,
    pub layer_type: LayerKind,
    /// Output of the layer, clipped to [0, 1]
    pub output: ImageArray,
    pub input_shape: Shape,
    pub output_shape: Shape,
    pub receptive_field: usize,
    pub jump: usize,
}

/// An ordered list of validated layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    layers: Vec<Layer>,
}

impl Pipeline {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Validates all specs. The first invalid spec determines the error.
    pub fn from_specs(specs: &[LayerSpec]) -> PipelineResult<Pipeline> {
        let layers = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| Layer::from_spec(index, spec))
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Pipeline::new(layers))
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Runs all layers in order on the input. `rng` feeds the dropout layers.
    ///
    /// Returns one record per layer, or the first error; earlier records are
    /// discarded in that case.
    pub fn run<R: Rng>(&self, input: &ImageArray, rng: &mut R) -> PipelineResult<Vec<LayerRecord>> {
        validate_input(input)?;

        let mut tracker = ReceptiveField::new();
        let mut records: Vec<LayerRecord> = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter().enumerate() {
            let source = records.last().map_or(input, |record| &record.output);
            let input_shape = shape_of(source);
            layer.check_fits(index, input_shape)?;

            let mut output = layer.apply(source, rng);
            clip_unit(&mut output);

            if let Some((kernel_size, stride, _)) = layer.window() {
                tracker = tracker.advance(kernel_size, stride).ok_or(
                    PipelineError::ReceptiveFieldOverflow {
                        index,
                        layer_type: layer.kind(),
                    },
                )?;
            }
            let output_shape = shape_of(&output);
            debug!(
                "Layer {} ({}): {:?} -> {:?}, receptive field {}, jump {}",
                index,
                layer.kind(),
                input_shape,
                output_shape,
                tracker.receptive_field,
                tracker.jump
            );

            records.push(LayerRecord {
                layer_index: index,
                layer_type: layer.kind(),
                output,
                input_shape,
                output_shape,
                receptive_field: tracker.receptive_field,
                jump: tracker.jump,
            });
        }
        Ok(records)
    }
}

/// Validates the specs and runs them on the input, see [`Pipeline::run`].
pub fn run_pipeline<R: Rng>(
    input: &ImageArray,
    specs: &[LayerSpec],
    rng: &mut R,
) -> PipelineResult<Vec<LayerRecord>> {
    Pipeline::from_specs(specs)?.run(input, rng)
}

fn validate_input(input: &ImageArray) -> PipelineResult<()> {
    let [height, width, channels] = shape_of(input);
    if channels != NUM_CHANNELS {
        return Err(PipelineError::InvalidInput(format!(
            "expected {} channels, got {}",
            NUM_CHANNELS, channels
        )));
    }
    if height == 0 || width == 0 {
        return Err(PipelineError::InvalidInput(format!(
            "image of size {}x{} has no pixels",
            height, width
        )));
    }
    Ok(())
}

/// Clips every element to [0, 1].
fn clip_unit(image: &mut ImageArray) {
    image.mapv_inplace(|x| x.max(0.).min(1.));
}
