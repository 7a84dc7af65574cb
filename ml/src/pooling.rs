//! Max and average pooling over square windows.
use crate::{convolutions::pad_replicate, ImageArray, ImagePrecision};
use ndarray::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolingKind {
    Max,
    Average,
}

/// Pooling layer. Windows of `kernel_size x kernel_size` start at every multiple of
/// `stride` of the edge-replicated input; each channel is reduced separately.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolingLayer {
    kind: PoolingKind,
    kernel_size: usize,
    stride: usize,
    padding: usize,
}

impl PoolingLayer {
    pub fn new(kind: PoolingKind, kernel_size: usize, stride: usize, padding: usize) -> Self {
        debug_assert!(kernel_size > 0, "Kernel size of 0 passed");
        debug_assert!(stride > 0, "Stride of 0 passed");
        Self {
            kind,
            kernel_size,
            stride,
            padding,
        }
    }

    pub fn kind(&self) -> PoolingKind {
        self.kind
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn pool(&self, image: &ImageArray) -> ImageArray {
        pool2d(
            image,
            self.kind,
            self.kernel_size,
            self.stride,
            self.padding,
        )
    }
}

/// Pools the image with the given window. Panics if the window does not fit into the
/// padded image.
pub fn pool2d<'a, V>(
    im: V,
    kind: PoolingKind,
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> ImageArray
where
    V: AsArray<'a, ImagePrecision, Ix3>,
{
    let padded = pad_replicate(im, padding);
    let (padded_height, padded_width, channels) = padded.dim();
    assert!(
        padded_height >= kernel_size && padded_width >= kernel_size,
        "Pooling window does not fit into the padded image"
    );

    let new_height = (padded_height - kernel_size) / stride + 1;
    let new_width = (padded_width - kernel_size) / stride + 1;
    let window_len = (kernel_size * kernel_size) as ImagePrecision;

    Array3::from_shape_fn((new_height, new_width, channels), |(i, j, c)| {
        let (top, left) = (i * stride, j * stride);
        let window = padded.slice(s![top..top + kernel_size, left..left + kernel_size, c]);
        match kind {
            PoolingKind::Max => window.fold(ImagePrecision::NEG_INFINITY, |acc, &x| acc.max(x)),
            PoolingKind::Average => window.sum() / window_len,
        }
    })
}

pub fn max_pool2d<'a, V>(im: V, kernel_size: usize, stride: usize, padding: usize) -> ImageArray
where
    V: AsArray<'a, ImagePrecision, Ix3>,
{
    pool2d(im, PoolingKind::Max, kernel_size, stride, padding)
}

pub fn avg_pool2d<'a, V>(im: V, kernel_size: usize, stride: usize, padding: usize) -> ImageArray
where
    V: AsArray<'a, ImagePrecision, Ix3>,
{
    pool2d(im, PoolingKind::Average, kernel_size, stride, padding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> ImageArray {
        Array3::from_shape_fn((rows, cols, 1), |(i, j, _)| (i * cols + j + 1) as f32)
    }

    #[test]
    fn test_max_pool() {
        let pooled = max_pool2d(&ramp(4, 4), 2, 2, 0);
        let expected = Array::from_shape_vec((2, 2, 1), vec![6., 8., 14., 16.]).unwrap();
        assert_eq!(pooled, expected);
    }

    #[test]
    fn test_avg_pool() {
        let pooled = avg_pool2d(&ramp(4, 4), 2, 2, 0);
        let expected = Array::from_shape_vec((2, 2, 1), vec![3.5, 5.5, 11.5, 13.5]).unwrap();
        assert_eq!(pooled, expected);
    }

    #[test]
    fn test_overlapping_windows() {
        let layer = PoolingLayer::new(PoolingKind::Max, 2, 1, 0);
        let pooled = layer.pool(&ramp(3, 3));
        let expected = Array::from_shape_vec((2, 2, 1), vec![5., 6., 8., 9.]).unwrap();
        assert_eq!(pooled, expected);
    }

    #[test]
    fn test_odd_input_drops_remainder() {
        let pooled = max_pool2d(&ramp(5, 5), 2, 2, 0);
        assert_eq!(pooled.dim(), (2, 2, 1));
        assert_eq!(pooled[[1, 1, 0]], 19.);
    }

    #[test]
    fn test_padding_replicates_edges() {
        let pooled = avg_pool2d(&ramp(2, 2), 3, 1, 1);
        assert_eq!(pooled.dim(), (2, 2, 1));
        // top left window of the padded image is [[1, 1, 2], [1, 1, 2], [3, 3, 4]]
        assert!((pooled[[0, 0, 0]] - 18. / 9.).abs() < 1e-6);
    }

    #[test]
    fn test_channels_pooled_separately() {
        let image = Array3::from_shape_fn((2, 2, 3), |(i, j, c)| (i * 2 + j) as f32 + 10. * c as f32);
        let pooled = max_pool2d(&image, 2, 2, 0);
        assert_eq!(pooled.dim(), (1, 1, 3));
        assert_eq!(pooled.into_raw_vec(), vec![3., 13., 23.]);
    }
}
