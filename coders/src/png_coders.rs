use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use ml::{ImageArray, ImagePrecision, NUM_CHANNELS};
use nshare::ToNdarray3;

use crate::{check_payload_size, CodingError, CodingResult, Decoder, Encoder};

/// Coder for base64 encoded images. Decoding accepts every format the image crate
/// can read, encoding always produces PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngBase64Coder {}

impl PngBase64Coder {
    pub fn new() -> Self {
        Self {}
    }
}

impl Encoder<ImageArray> for PngBase64Coder {
    fn encode(&self, data: &ImageArray) -> CodingResult<String> {
        encode_base64(data)
    }
}

impl Decoder<ImageArray> for PngBase64Coder {
    fn decode(&self, encoded: &str) -> CodingResult<ImageArray> {
        decode_base64(encoded)
    }
}

/// Decodes raw image file bytes into a (height, width, channel) array in [0, 1].
pub fn decode_image(bytes: &[u8]) -> CodingResult<ImageArray> {
    check_payload_size(bytes.len())?;
    let image = image::load_from_memory(bytes)?;
    Ok(image_to_ndarray(&image))
}

/// Decodes a base64 string (optionally a `data:` url) into an array in [0, 1].
pub fn decode_base64(encoded: &str) -> CodingResult<ImageArray> {
    decode_image(&decode_base64_bytes(encoded)?)
}

/// Decodes a base64 string (optionally a `data:` url) into the image file bytes.
pub fn decode_base64_bytes(encoded: &str) -> CodingResult<Vec<u8>> {
    let payload: String = strip_data_url(encoded.trim())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    // every 4 base64 characters carry 3 bytes
    check_payload_size(payload.len() / 4 * 3)?;
    Ok(STANDARD.decode(payload.as_bytes())?)
}

/// Encodes the array as PNG file bytes.
pub fn encode_png(arr: &ImageArray) -> CodingResult<Vec<u8>> {
    let image = DynamicImage::ImageRgb8(array_to_image(arr)?);
    let mut buffer = Vec::new();
    image.write_to(&mut buffer, ImageOutputFormat::Png)?;
    Ok(buffer)
}

/// Encodes the array as base64 encoded PNG.
pub fn encode_base64(arr: &ImageArray) -> CodingResult<String> {
    Ok(STANDARD.encode(encode_png(arr)?))
}

fn strip_data_url(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        if let Some((_, data)) = encoded.split_once(',') {
            return data;
        }
    }
    encoded
}

/// Returns the image as pre-scaled array, ready to be put into a pipeline
pub fn image_to_ndarray(img: &DynamicImage) -> ImageArray {
    // nshare hands out the image in PT layout, which is (C,H,W), but we need (H,W,C)
    img.to_rgb8()
        .into_ndarray3()
        .permuted_axes([1, 2, 0])
        .as_standard_layout()
        .mapv(|x| x as ImagePrecision / 255.0)
}

/// Turns a value of a pipeline output into a pixel value.
/// Values are clipped to [0, 1] and scaled, the fractional part is dropped.
pub fn to_pixel(x: &ImagePrecision) -> u8 {
    (x.max(0.0).min(1.0) * 255.0) as u8
}

/// Turns a (height, width, channel) array into an rgb image
pub fn array_to_image(arr: &ImageArray) -> CodingResult<RgbImage> {
    let (height, width, channels) = arr.dim();
    if channels != NUM_CHANNELS {
        return Err(CodingError::ShapeError(arr.shape().to_vec()));
    }
    // logical iteration order is (H,W,C), which is the raw layout of RgbImage
    let raw: Vec<u8> = arr.iter().map(to_pixel).collect();

    RgbImage::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| CodingError::ShapeError(arr.shape().to_vec()))
}
