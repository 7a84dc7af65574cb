use ml::LayerSpec;

/// Layers suggested when the service cannot answer: edge detection, then a
/// sharpened view of the pooled features.
pub fn fallback_template() -> Vec<LayerSpec> {
    vec![
        LayerSpec::conv("sobel_x").with_stride(1).with_padding(1),
        LayerSpec::new("relu"),
        LayerSpec::new("maxpool").with_kernel_size(2).with_stride(2),
        LayerSpec::conv("sharpen").with_stride(1).with_padding(1),
        LayerSpec::new("relu"),
        LayerSpec::new("avgpool").with_kernel_size(2).with_stride(2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml::{LayerKind, Pipeline};

    #[test]
    fn test_template_is_valid() {
        let pipeline = Pipeline::from_specs(&fallback_template()).unwrap();
        let kinds: Vec<LayerKind> = pipeline.layers().iter().map(|l| l.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                LayerKind::Conv,
                LayerKind::Relu,
                LayerKind::MaxPool,
                LayerKind::Conv,
                LayerKind::Relu,
                LayerKind::AvgPool
            ]
        );
    }

    #[test]
    fn test_template_serializes_like_client_input() {
        let json = serde_json::to_value(&fallback_template()).unwrap();
        assert_eq!(json[0]["type"], "conv");
        assert_eq!(json[0]["kernel_type"], "sobel_x");
        assert_eq!(json[2]["kernel_size"], 2);
    }
}
