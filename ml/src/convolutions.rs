use crate::{kernels::get_kernel, ImageArray, ImagePrecision, WeightPrecision};
use ndarray::*;

/// Rust implementation of a convolutional layer with a single fixed kernel.
/// The kernel has dimension kernel height x kernel width and is applied
/// identically to every channel of the image, so the number of channels
/// never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionLayer {
    /// Weight matrix of the kernel
    kernel: Array2<WeightPrecision>,
    stride: usize,
    padding: usize,
}

impl ConvolutionLayer {
    pub fn new(weights: Array2<WeightPrecision>, stride: usize, padding: usize) -> ConvolutionLayer {
        debug_assert!(stride > 0, "Stride of 0 passed");

        ConvolutionLayer {
            kernel: weights,
            stride,
            padding,
        }
    }

    /// Creates a layer from a kernel of the catalog, see [`crate::kernels::get_kernel`].
    pub fn from_kernel_name(name: &str, stride: usize, padding: usize) -> ConvolutionLayer {
        ConvolutionLayer::new(get_kernel(name), stride, padding)
    }

    pub fn kernel(&self) -> &Array2<WeightPrecision> {
        &self.kernel
    }

    /// Side length of the (square) kernel.
    pub fn kernel_size(&self) -> usize {
        self.kernel.len_of(Axis(0))
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Performs a convolution on the given image data using this layers parameters.
    pub fn convolve(&self, image: &ImageArray) -> ImageArray {
        conv2d(&self.kernel, image, self.stride, self.padding)
    }
}

/// Number of outputs along one axis for a sliding window,
/// `floor((input + 2 * padding - kernel) / stride) + 1`.
/// Returns None if the window does not fit into the padded input
/// or the padded size is not representable.
pub fn output_size(input: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
    debug_assert!(stride > 0, "Stride of 0 passed");
    padding
        .checked_mul(2)?
        .checked_add(input)?
        .checked_sub(kernel)
        .map(|span| span / stride + 1)
}

/// Pads height and width of the image by `padding` cells on every side,
/// replicating the outermost rows and columns.
///
/// Panics if the image has zero height or width and padding is requested.
pub fn pad_replicate<'a, V>(image: V, padding: usize) -> ImageArray
where
    V: AsArray<'a, ImagePrecision, Ix3>,
{
    let image: ArrayView3<ImagePrecision> = image.into();
    if padding == 0 {
        return image.to_owned();
    }
    let (height, width, channels) = image.dim();
    assert!(height > 0 && width > 0, "Cannot replicate edges of an empty image");

    Array3::from_shape_fn(
        (height + 2 * padding, width + 2 * padding, channels),
        |(i, j, c)| {
            let src_i = i.saturating_sub(padding).min(height - 1);
            let src_j = j.saturating_sub(padding).min(width - 1);
            image[[src_i, src_j, c]]
        },
    )
}

/// Convolves every channel of the image with the same 2d kernel
/// (cross-correlation, the kernel is not flipped, like in pytorch).
///
/// The image is padded by edge replication, then the dense (stride 1) result is
/// computed and every `stride`-th row and column of it is kept. The output
/// therefore has `floor((in + 2 * padding - kernel) / stride) + 1` rows/columns.
///
/// Panics if the kernel does not fit into the padded image.
pub fn conv2d<'a, T, V>(kernel_weights: T, im: V, stride: usize, padding: usize) -> ImageArray
where
    // This trait bound ensures that kernel and im can be passed as owned array or view.
    // AsArray just ensures that im can be converted to an array view via ".into()".
    T: AsArray<'a, WeightPrecision, Ix2>,
    V: AsArray<'a, ImagePrecision, Ix3>,
{
    debug_assert!(stride > 0, "Stride of 0 passed");
    let kernel: ArrayView2<WeightPrecision> = kernel_weights.into();
    let padded = pad_replicate(im, padding);

    let (kernel_height, kernel_width) = kernel.dim();
    let (padded_height, padded_width, channels) = padded.dim();
    assert!(
        padded_height >= kernel_height && padded_width >= kernel_width,
        "Kernel does not fit into the padded image"
    );

    let dense_height = padded_height - kernel_height + 1;
    let dense_width = padded_width - kernel_width + 1;

    // Accumulating shifted views broadcasts the kernel over all channels at once.
    let mut dense: ImageArray = Array::zeros((dense_height, dense_width, channels));
    for ((ki, kj), &weight) in kernel.indexed_iter() {
        let shifted = padded.slice(s![ki..ki + dense_height, kj..kj + dense_width, ..]);
        dense.scaled_add(weight, &shifted);
    }

    dense.slice(s![..;stride, ..;stride, ..]).to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_channel(rows: usize, cols: usize, values: Vec<ImagePrecision>) -> ImageArray {
        Array::from_shape_vec((rows, cols, 1), values).unwrap()
    }

    #[test]
    fn test_2d_conv_valid() {
        let test_img = single_channel(3, 3, vec![0., 1., 0., 0., 0., 0., -1., 0., 0.]);
        let conv_layer = ConvolutionLayer::new(array![[0., 1.], [-1., 0.]], 1, 0);

        let convolved_image = conv_layer.convolve(&test_img);

        assert_eq!(convolved_image, single_channel(2, 2, vec![1., 0., 1., 0.]));
    }

    #[test]
    fn test_2d_conv_with_stride() {
        let test_img = single_channel(3, 3, vec![0., 1., 0., 0., 0., 0., -1., 0., 0.]);
        let conv_layer = ConvolutionLayer::new(array![[1.]], 2, 0);

        let convolved_image = conv_layer.convolve(&test_img);

        assert_eq!(convolved_image, single_channel(2, 2, vec![0., 0., -1., 0.]));
    }

    #[test]
    fn test_2d_conv_per_channel() {
        let channel = [
            [1.0, 2.0, 3.0, 4.0],
            [4.0, 5.0, 6.0, 7.0],
            [7.0, 8.0, 9.0, 9.0],
            [7.0, 8.0, 9.0, 9.0],
        ];
        let test_img = Array3::from_shape_fn((4, 4, 3), |(i, j, _)| channel[i][j]);
        let kernel = array![[1., 2.], [1., 2.]];

        let convolved_image = conv2d(&kernel, &test_img, 1, 0);

        let expected = array![
            [19.0, 25.0, 31.0],
            [37.0, 43.0, 47.0],
            [46.0, 52.0, 54.0],
        ];
        assert_eq!(convolved_image.dim(), (3, 3, 3));
        for c in 0..3 {
            assert_eq!(convolved_image.index_axis(Axis(2), c), expected);
        }
    }

    #[test]
    fn test_pad_replicate() {
        let test_img = single_channel(2, 2, vec![1., 2., 3., 4.]);
        let padded = pad_replicate(&test_img, 1);
        let expected = single_channel(
            4,
            4,
            vec![
                1., 1., 2., 2., //
                1., 1., 2., 2., //
                3., 3., 4., 4., //
                3., 3., 4., 4.,
            ],
        );
        assert_eq!(padded, expected);
    }

    #[test]
    fn test_identity_kernel_reproduces_input() {
        let test_img = Array3::from_shape_fn((5, 4, 3), |(i, j, c)| {
            ((i * 7 + j * 3 + c) % 11) as ImagePrecision / 10.
        });
        let conv_layer = ConvolutionLayer::from_kernel_name("identity", 1, 1);
        assert_eq!(conv_layer.convolve(&test_img), test_img);
    }

    #[test]
    fn test_stride_subsamples_dense_result() {
        let test_img = Array3::from_shape_fn((4, 4, 3), |(i, j, c)| (i * 4 + j + c) as f32);
        let conv_layer = ConvolutionLayer::from_kernel_name("identity", 2, 1);

        let convolved_image = conv_layer.convolve(&test_img);

        assert_eq!(convolved_image.dim(), (2, 2, 3));
        assert_eq!(
            convolved_image,
            test_img.slice(s![..;2, ..;2, ..]).to_owned()
        );
    }

    #[test]
    fn test_blur_keeps_constant_image() {
        let test_img = Array3::from_elem((4, 4, 3), 0.5);
        let conv_layer = ConvolutionLayer::from_kernel_name("blur", 1, 1);
        let convolved_image = conv_layer.convolve(&test_img);
        assert_eq!(convolved_image.dim(), (4, 4, 3));
        assert!(convolved_image.iter().all(|x| (x - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_output_size() {
        assert_eq!(output_size(4, 3, 1, 1), Some(4));
        assert_eq!(output_size(4, 3, 2, 1), Some(2));
        assert_eq!(output_size(5, 2, 2, 0), Some(2));
        assert_eq!(output_size(2, 3, 1, 0), None);
        assert_eq!(output_size(1, 3, 1, 1), Some(1));
        assert_eq!(output_size(4, 2, 1, usize::MAX), None);
        assert_eq!(output_size(usize::MAX, 2, 1, 1), None);
    }
}
