//! Serializable results of a pipeline run, as handed to clients.
use ml::{statistics::Statistics, ImageArray, LayerKind, LayerRecord, PipelineError, Shape};
use serde_derive::{Deserialize, Serialize};

use crate::{CodingResult, Encoder};

/// One layer of a pipeline run with its output in transport form.
#[derive(Debug, Clone, Serialize)]
pub struct LayerReport {
    pub layer_index: usize,
    pub layer_type: LayerKind,
    pub base64_image: String,
    pub input_shape: Shape,
    pub output_shape: Shape,
    pub receptive_field: usize,
    pub jump: usize,
    pub statistics: Statistics,
}

impl LayerReport {
    pub fn from_record<E>(record: &LayerRecord, encoder: &E) -> CodingResult<LayerReport>
    where
        E: Encoder<ImageArray>,
    {
        Ok(LayerReport {
            layer_index: record.layer_index,
            layer_type: record.layer_type,
            base64_image: encoder.encode(&record.output)?,
            input_shape: record.input_shape,
            output_shape: record.output_shape,
            receptive_field: record.receptive_field,
            jump: record.jump,
            statistics: Statistics::new(&record.output),
        })
    }
}

/// Response for a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub results: Vec<LayerReport>,
}

impl ProcessResponse {
    pub fn from_records<E>(records: &[LayerRecord], encoder: &E) -> CodingResult<ProcessResponse>
    where
        E: Encoder<ImageArray>,
    {
        let results = records
            .iter()
            .map(|record| LayerReport::from_record(record, encoder))
            .collect::<CodingResult<Vec<_>>>()?;
        Ok(ProcessResponse {
            success: true,
            results,
        })
    }
}

/// Response for a failed run. No partial results are ever reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_index: Option<usize>,
}

impl ErrorResponse {
    pub fn new<M: ToString>(message: M) -> Self {
        Self {
            success: false,
            error: message.to_string(),
            layer_index: None,
        }
    }

    pub fn from_pipeline_error(err: &PipelineError) -> Self {
        Self {
            layer_index: err.layer_index(),
            ..Self::new(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode_base64, PngBase64Coder};
    use ml::{run_pipeline, LayerSpec};
    use ndarray::Array3;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_process_response() {
        let input = Array3::from_elem((8, 6, 3), 0.5);
        let specs = vec![LayerSpec::conv("blur"), LayerSpec::new("maxpool")];
        let records = run_pipeline(&input, &specs, &mut StdRng::seed_from_u64(0)).unwrap();

        let response = ProcessResponse::from_records(&records, &PngBase64Coder::new()).unwrap();
        assert!(response.success);
        assert_eq!(response.results.len(), 2);

        let pooled = &response.results[1];
        assert_eq!(pooled.layer_type, LayerKind::MaxPool);
        assert_eq!(pooled.output_shape, [4, 3, 3]);
        assert_eq!(decode_base64(&pooled.base64_image).unwrap().dim(), (4, 3, 3));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["results"][1]["layer_type"], "maxpool");
        assert_eq!(json["results"][1]["receptive_field"], 4);
        assert_eq!(json["results"][1]["jump"], 2);
        assert_eq!(json["results"][0]["input_shape"], serde_json::json!([8, 6, 3]));
    }

    #[test]
    fn test_error_response() {
        let err = PipelineError::InvalidLayerType {
            index: 2,
            layer_type: "softmax".to_string(),
        };
        let response = ErrorResponse::from_pipeline_error(&err);
        assert!(!response.success);
        assert_eq!(response.layer_index, Some(2));
        assert!(response.error.contains("softmax"));

        let json = serde_json::to_string(&ErrorResponse::new("No layers given")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"No layers given"}"#);
    }
}
