use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, GenericImageView};
use log::debug;

use crate::{check_payload_size, CodingResult};

pub const DEFAULT_MAX_DIMENSION: u32 = 512;
pub const DEFAULT_JPEG_QUALITY: u8 = 70;

/// Shrinks an image before it is sent to the suggestion service and recompresses it
/// as JPEG. The longer side ends up at most `max_dimension` pixels, the aspect ratio
/// is kept and small images are never upscaled.
///
/// The output is deterministic, so it doubles as the cache key material for
/// suggestions.
pub fn prepare_for_advisor(
    bytes: &[u8],
    max_dimension: u32,
    jpeg_quality: u8,
) -> CodingResult<Vec<u8>> {
    check_payload_size(bytes.len())?;
    let image = image::load_from_memory(bytes)?;

    let image = if image.width() > max_dimension || image.height() > max_dimension {
        debug!(
            "Downsizing {}x{} image to fit {} pixels",
            image.width(),
            image.height(),
            max_dimension
        );
        image.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        image
    };

    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, jpeg_quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_png;
    use ndarray::Array3;

    fn checkerboard(height: usize, width: usize) -> Vec<u8> {
        let arr = Array3::from_shape_fn((height, width, 3), |(i, j, c)| {
            if (i / 8 + j / 8 + c) % 2 == 0 {
                1.0
            } else {
                0.0
            }
        });
        encode_png(&arr).unwrap()
    }

    #[test]
    fn test_large_images_are_downsized() {
        let prepared = prepare_for_advisor(&checkerboard(300, 1024), 512, 70).unwrap();
        let decoded = image::load_from_memory(&prepared).unwrap();
        assert_eq!(decoded.dimensions(), (512, 150));
    }

    #[test]
    fn test_small_images_keep_their_size() {
        let prepared = prepare_for_advisor(&checkerboard(30, 40), 512, 70).unwrap();
        let decoded = image::load_from_memory(&prepared).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
        assert_eq!(
            image::guess_format(&prepared).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_preparation_is_deterministic() {
        let png = checkerboard(64, 64);
        assert_eq!(
            prepare_for_advisor(&png, 32, 70).unwrap(),
            prepare_for_advisor(&png, 32, 70).unwrap()
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(prepare_for_advisor(b"garbage", 512, 70).is_err());
    }
}
