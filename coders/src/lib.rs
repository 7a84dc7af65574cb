//! This crate links the layer pipeline to the transport format used by clients.
//!
//! Clients send and receive images as base64 encoded PNG (or JPEG, GIF, ...) files,
//! the pipeline works on normalized (height, width, channel) arrays. For this purpose,
//! this crate provides traits for the encoders and decoders, the PNG implementation
//! of them, the preprocessing applied before an image is shown to the suggestion
//! service, and the serializable reports that wrap pipeline results.

mod coding_errors;
pub mod png_coders;
pub mod preparation;
pub mod reports;

pub use coding_errors::CodingError;
pub use png_coders::{
    decode_base64, decode_base64_bytes, decode_image, encode_base64, encode_png, PngBase64Coder,
};
pub use preparation::prepare_for_advisor;
pub use reports::{ErrorResponse, LayerReport, ProcessResponse};

/// Largest image payload (in raw, not base64 encoded bytes) that will be decoded.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Returned from the coders, as encoding and decoding might fail
pub type CodingResult<T> = std::result::Result<T, CodingError>;

/// The trait of an encoder. An encoder takes data of type T and returns its
/// transport representation.
pub trait Encoder<T> {
    /// Encodes the given data.
    fn encode(&self, data: &T) -> CodingResult<String>;
}

/// The trait of a decoder. A decoder takes the transport representation and
/// recovers data of type T.
pub trait Decoder<T> {
    /// Decodes the given data.
    fn decode(&self, encoded: &str) -> CodingResult<T>;
}

pub(crate) fn check_payload_size(size: usize) -> CodingResult<()> {
    if size > MAX_IMAGE_BYTES {
        return Err(CodingError::PayloadTooLarge {
            size,
            limit: MAX_IMAGE_BYTES,
        });
    }
    Ok(())
}
