//! Helpers of the command line interface: reading inputs, writing layer images
//! and rendering results for the terminal.
use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use log::info;
use thiserror::Error;

use advisor::AdvisorError;
use coders::CodingError;
use ml::{kernels::KernelKind, ImageArray, LayerRecord, LayerSpec, PipelineError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Coding(#[from] CodingError),
    #[error("Could not parse layers: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Advisor(#[from] AdvisorError),
    #[error("The layer file contains no layers")]
    NoLayers,
}

/// Reads an image file into a normalized array.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<ImageArray, CliError> {
    let bytes = fs::read(path)?;
    Ok(coders::decode_image(&bytes)?)
}

/// Reads a JSON list of layer specifications.
pub fn read_layers<P: AsRef<Path>>(path: P) -> Result<Vec<LayerSpec>, CliError> {
    let raw = fs::read_to_string(path)?;
    let layers: Vec<LayerSpec> = serde_json::from_str(&raw)?;
    if layers.is_empty() {
        return Err(CliError::NoLayers);
    }
    Ok(layers)
}

/// Returns "<dir>/<image stem>_layers" for "<dir>/<image stem>.<ext>"
pub fn default_output_dir(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    image.with_file_name(format!("{}_layers", stem))
}

pub fn layer_file_name(record: &LayerRecord) -> String {
    format!("layer_{}_{}.png", record.layer_index, record.layer_type)
}

/// Writes the output of every layer as PNG into `dir`, creating it if needed.
pub fn write_layer_images(records: &[LayerRecord], dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(records.len());
    for record in records {
        let path = dir.join(layer_file_name(record));
        fs::write(&path, coders::encode_png(&record.output)?)?;
        info!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn format_shape(shape: &[usize; 3]) -> String {
    format!("{}x{}x{}", shape[0], shape[1], shape[2])
}

/// One line per layer with shapes, receptive field and value statistics.
pub fn format_table(records: &[LayerRecord]) -> String {
    let mut table = format!(
        "{:>5}  {:<9}  {:>12}  {:>12}  {:>4}  {:>4}  statistics\n",
        "layer", "type", "input", "output", "rf", "jump"
    );
    for record in records {
        let stats = ml::statistics::Statistics::new(&record.output);
        // writing into a String cannot fail
        let _ = writeln!(
            table,
            "{:>5}  {:<9}  {:>12}  {:>12}  {:>4}  {:>4}  {}",
            record.layer_index,
            record.layer_type.name(),
            format_shape(&record.input_shape),
            format_shape(&record.output_shape),
            record.receptive_field,
            record.jump,
            stats
        );
    }
    table
}

/// Lists all kernels with their weights.
pub fn kernel_table() -> String {
    let mut table = String::new();
    for kind in KernelKind::ALL.iter() {
        let weights = kind.weights();
        let rows: Vec<String> = weights
            .outer_iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(|w| format!("{:>6.3}", w)).collect();
                values.join(" ")
            })
            .collect();
        let _ = writeln!(table, "{:<12} [{}]", kind.name(), rows.join(" | "));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml::run_pipeline;
    use ndarray::Array3;
    use rand::{rngs::StdRng, SeedableRng};

    fn records() -> Vec<LayerRecord> {
        let input = Array3::from_elem((4, 4, 3), 0.5);
        let specs = vec![LayerSpec::conv("blur"), LayerSpec::new("maxpool")];
        run_pipeline(&input, &specs, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    #[test]
    fn test_read_layers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layers.json");

        fs::write(&path, r#"[{"type": "conv", "kernel_type": "blur"}, {"type": "relu"}]"#).unwrap();
        let layers = read_layers(&path).unwrap();
        assert_eq!(layers, vec![LayerSpec::conv("blur"), LayerSpec::new("relu")]);

        fs::write(&path, "[]").unwrap();
        assert!(matches!(read_layers(&path), Err(CliError::NoLayers)));

        fs::write(&path, "{").unwrap();
        assert!(matches!(read_layers(&path), Err(CliError::Json(_))));
    }

    #[test]
    fn test_write_layer_images() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let written = write_layer_images(&records(), &out).unwrap();

        assert_eq!(
            written,
            vec![out.join("layer_0_conv.png"), out.join("layer_1_maxpool.png")]
        );
        let pooled = read_image(&written[1]).unwrap();
        assert_eq!(pooled.dim(), (2, 2, 3));
    }

    #[test]
    fn test_default_output_dir() {
        assert_eq!(
            default_output_dir(Path::new("/tmp/cat.png")),
            PathBuf::from("/tmp/cat_layers")
        );
    }

    #[test]
    fn test_tables() {
        let table = format_table(&records());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("maxpool"));
        assert!(lines[2].contains("2x2x3"));

        let kernels = kernel_table();
        assert_eq!(kernels.lines().count(), KernelKind::ALL.len());
        assert!(kernels.contains("sobel_x"));
    }
}
