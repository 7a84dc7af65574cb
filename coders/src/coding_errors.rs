use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodingError {
    #[error("Image payload is not valid base64: {0}")]
    Base64Error(#[from] base64::DecodeError),
    #[error("Could not decode or encode image: {0}")]
    ImageError(#[from] image::ImageError),
    #[error("Image payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("Array of shape {0:?} cannot be stored as an RGB image")]
    ShapeError(Vec<usize>),
}
