//! The fixed catalog of 3x3 kernels available to convolution layers.
//!
//! Kernels are looked up by name. Names that are not in the catalog silently resolve
//! to the sharpen kernel, which is also what the name `default` refers to.
use log::debug;
use ndarray::{arr2, Array2};

use crate::WeightPrecision;

/// Side length of every kernel in the catalog.
pub const KERNEL_SIZE: usize = 3;

type KernelMatrix = [[WeightPrecision; KERNEL_SIZE]; KERNEL_SIZE];

const IDENTITY: KernelMatrix = [[0., 0., 0.], [0., 1., 0.], [0., 0., 0.]];
const SHARPEN: KernelMatrix = [[0., -1., 0.], [-1., 5., -1.], [0., -1., 0.]];
const BLUR: KernelMatrix = [
    [1. / 9., 1. / 9., 1. / 9.],
    [1. / 9., 1. / 9., 1. / 9.],
    [1. / 9., 1. / 9., 1. / 9.],
];
const GAUSSIAN: KernelMatrix = [
    [1. / 16., 2. / 16., 1. / 16.],
    [2. / 16., 4. / 16., 2. / 16.],
    [1. / 16., 2. / 16., 1. / 16.],
];
const SOBEL_X: KernelMatrix = [[-1., 0., 1.], [-2., 0., 2.], [-1., 0., 1.]];
const SOBEL_Y: KernelMatrix = [[-1., -2., -1.], [0., 0., 0.], [1., 2., 1.]];
const LAPLACIAN: KernelMatrix = [[0., -1., 0.], [-1., 4., -1.], [0., -1., 0.]];
const EMBOSS: KernelMatrix = [[-2., -1., 0.], [-1., 1., 1.], [0., 1., 2.]];
const EDGE_ENHANCE: KernelMatrix = [[0., 0., 0.], [-1., 1., 0.], [0., 0., 0.]];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelKind {
    Identity,
    Sharpen,
    Blur,
    Gaussian,
    SobelX,
    SobelY,
    Laplacian,
    Emboss,
    EdgeEnhance,
}

impl KernelKind {
    /// Every kernel in the catalog, in display order.
    pub const ALL: [KernelKind; 9] = [
        KernelKind::Identity,
        KernelKind::Sharpen,
        KernelKind::Blur,
        KernelKind::Gaussian,
        KernelKind::SobelX,
        KernelKind::SobelY,
        KernelKind::Laplacian,
        KernelKind::Emboss,
        KernelKind::EdgeEnhance,
    ];

    /// Resolves a kernel name. Unknown names fall back to [`KernelKind::Sharpen`].
    pub fn from_name(name: &str) -> KernelKind {
        match name {
            "identity" => KernelKind::Identity,
            "sharpen" | "default" => KernelKind::Sharpen,
            "blur" => KernelKind::Blur,
            "gaussian" => KernelKind::Gaussian,
            "sobel_x" => KernelKind::SobelX,
            "sobel_y" => KernelKind::SobelY,
            "laplacian" => KernelKind::Laplacian,
            "emboss" => KernelKind::Emboss,
            "edge_enhance" => KernelKind::EdgeEnhance,
            unknown => {
                debug!("Unknown kernel {:?}, using sharpen instead", unknown);
                KernelKind::Sharpen
            }
        }
    }

    /// Canonical name of the kernel, accepted by [`KernelKind::from_name`].
    pub fn name(self) -> &'static str {
        match self {
            KernelKind::Identity => "identity",
            KernelKind::Sharpen => "sharpen",
            KernelKind::Blur => "blur",
            KernelKind::Gaussian => "gaussian",
            KernelKind::SobelX => "sobel_x",
            KernelKind::SobelY => "sobel_y",
            KernelKind::Laplacian => "laplacian",
            KernelKind::Emboss => "emboss",
            KernelKind::EdgeEnhance => "edge_enhance",
        }
    }

    fn matrix(self) -> KernelMatrix {
        match self {
            KernelKind::Identity => IDENTITY,
            KernelKind::Sharpen => SHARPEN,
            KernelKind::Blur => BLUR,
            KernelKind::Gaussian => GAUSSIAN,
            KernelKind::SobelX => SOBEL_X,
            KernelKind::SobelY => SOBEL_Y,
            KernelKind::Laplacian => LAPLACIAN,
            KernelKind::Emboss => EMBOSS,
            KernelKind::EdgeEnhance => EDGE_ENHANCE,
        }
    }

    /// The kernel weights as a (height, width) array.
    pub fn weights(self) -> Array2<WeightPrecision> {
        arr2(&self.matrix())
    }
}

/// Returns the weights of the kernel with the given name, falling back to sharpen.
pub fn get_kernel(name: &str) -> Array2<WeightPrecision> {
    KernelKind::from_name(name).weights()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_kernel_literals() {
        assert_eq!(
            get_kernel("identity"),
            array![[0., 0., 0.], [0., 1., 0.], [0., 0., 0.]]
        );
        assert_eq!(
            get_kernel("sharpen"),
            array![[0., -1., 0.], [-1., 5., -1.], [0., -1., 0.]]
        );
        assert_eq!(get_kernel("blur"), Array2::from_elem((3, 3), 1. / 9.));
        assert_eq!(
            get_kernel("gaussian"),
            array![[1., 2., 1.], [2., 4., 2.], [1., 2., 1.]] / 16.
        );
        assert_eq!(
            get_kernel("sobel_x"),
            array![[-1., 0., 1.], [-2., 0., 2.], [-1., 0., 1.]]
        );
        assert_eq!(
            get_kernel("sobel_y"),
            array![[-1., -2., -1.], [0., 0., 0.], [1., 2., 1.]]
        );
        assert_eq!(
            get_kernel("laplacian"),
            array![[0., -1., 0.], [-1., 4., -1.], [0., -1., 0.]]
        );
        assert_eq!(
            get_kernel("emboss"),
            array![[-2., -1., 0.], [-1., 1., 1.], [0., 1., 2.]]
        );
        assert_eq!(
            get_kernel("edge_enhance"),
            array![[0., 0., 0.], [-1., 1., 0.], [0., 0., 0.]]
        );
    }

    #[test]
    fn test_unknown_kernel_falls_back_to_sharpen() {
        let sharpen = get_kernel("sharpen");
        assert_eq!(get_kernel("default"), sharpen);
        assert_eq!(get_kernel("does_not_exist"), sharpen);
        assert_eq!(get_kernel(""), sharpen);
        assert_eq!(get_kernel("Blur"), sharpen);
    }

    #[test]
    fn test_names_resolve_to_themselves() {
        for kind in KernelKind::ALL.iter() {
            assert_eq!(KernelKind::from_name(kind.name()), *kind);
            assert_eq!(kind.weights().dim(), (KERNEL_SIZE, KERNEL_SIZE));
        }
    }

    #[test]
    fn test_smoothing_kernels_sum_to_one() {
        assert!((get_kernel("blur").sum() - 1.0).abs() < 1e-6);
        assert_eq!(get_kernel("gaussian").sum(), 1.0);
        assert_eq!(get_kernel("laplacian").sum(), 0.0);
    }
}
