//! Browser bindings. All results are handed to JavaScript as JSON strings, failures
//! as an `ErrorResponse` with `success: false`.
use advisor::{Advisor, AdvisorConfig};
use coders::{decode_base64, decode_base64_bytes, ErrorResponse, PngBase64Coder, ProcessResponse};
use log::warn;
use ml::{kernels::KernelKind, LayerSpec, Pipeline};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Runs the layers given as JSON on the base64 encoded image.
/// Without a seed, dropout draws from the browser's entropy source.
#[wasm_bindgen]
pub fn process_layers(image_base64: &str, layers_json: &str, seed: Option<u32>) -> String {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed as u64),
        None => StdRng::from_entropy(),
    };
    match process(image_base64, layers_json, &mut rng) {
        Ok(response) => to_json(&response),
        Err(response) => to_json(&response),
    }
}

fn process(
    image_base64: &str,
    layers_json: &str,
    rng: &mut StdRng,
) -> Result<ProcessResponse, ErrorResponse> {
    let specs: Vec<LayerSpec> = serde_json::from_str(layers_json)
        .map_err(|e| ErrorResponse::new(format!("Could not parse layers: {}", e)))?;
    if specs.is_empty() {
        return Err(ErrorResponse::new("No layers given"));
    }
    let image = decode_base64(image_base64).map_err(ErrorResponse::new)?;

    let records = Pipeline::from_specs(&specs)
        .and_then(|pipeline| pipeline.run(&image, rng))
        .map_err(|e| ErrorResponse::from_pipeline_error(&e))?;
    ProcessResponse::from_records(&records, &PngBase64Coder::new()).map_err(ErrorResponse::new)
}

/// Names of all convolution kernels as JSON list.
#[wasm_bindgen]
pub fn available_kernels() -> String {
    let names: Vec<&str> = KernelKind::ALL.iter().map(|k| k.name()).collect();
    to_json(&names)
}

/// Layer suggestions for the page. Keeps its cache and rate limit between calls.
#[wasm_bindgen]
pub struct LayerAdvisor {
    advisor: Advisor,
}

#[wasm_bindgen]
impl LayerAdvisor {
    /// Creates an advisor from a JSON config, defaults are used for missing fields.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<LayerAdvisor, JsValue> {
        LayerAdvisor::from_config(config_json.as_deref())
            .map_err(|e| JsValue::from_str(&e.error))
    }

    pub fn suggest_layers(&mut self, image_base64: &str) -> String {
        let suggestion = decode_base64_bytes(image_base64)
            .map_err(ErrorResponse::new)
            .and_then(|bytes| self.advisor.suggest(&bytes).map_err(ErrorResponse::new));
        match suggestion {
            Ok(suggestion) => to_json(&suggestion),
            Err(response) => to_json(&response),
        }
    }
}

impl LayerAdvisor {
    fn from_config(config_json: Option<&str>) -> Result<LayerAdvisor, ErrorResponse> {
        let config = match config_json {
            Some(raw) => AdvisorConfig::from_json(raw).map_err(ErrorResponse::new)?,
            None => AdvisorConfig::default(),
        };
        let advisor = Advisor::new(config).map_err(ErrorResponse::new)?;
        Ok(LayerAdvisor { advisor })
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!("Could not serialize response: {}", e);
        format!(
            r#"{{"success":false,"error":"Could not serialize response: {}"}}"#,
            e.to_string().replace('"', "'")
        )
    })
}
