//! This crate ties in all the parts of the project and provides a command line interface
//! to run layer pipelines on images and to ask for layer suggestions.

use std::{fs, path::PathBuf};

use advisor::{Advisor, AdvisorConfig};
use coders::{ErrorResponse, PngBase64Coder, ProcessResponse};
use env_logger::Builder;
use layerscope::{
    default_output_dir, format_table, kernel_table, read_image, read_layers, write_layer_images,
    CliError,
};
use log::info;
use ml::Pipeline;
use quicli::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use structopt::StructOpt;

/// Runs a list of layers on an image and saves the output of every layer
#[derive(Debug, StructOpt)]
struct ProcessOpts {
    /// Path to the input image
    #[structopt(parse(from_os_str))]
    image: PathBuf,
    /// Path to a JSON file with the list of layers
    #[structopt(parse(from_os_str))]
    layers: PathBuf,
    /// Output directory, writes to /path/to/image_layers if not available
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<PathBuf>,
    /// Seed for the dropout layers, random if not available
    #[structopt(long = "seed")]
    seed: Option<u64>,
    /// Prints the full JSON response instead of a table
    #[structopt(long = "json")]
    json: bool,
    #[structopt(flatten)]
    verbosity: Verbosity,
}

/// Suggests layers for an image
#[derive(Debug, StructOpt)]
struct SuggestOpts {
    /// Path to the input image
    #[structopt(parse(from_os_str))]
    image: PathBuf,
    /// Path to a JSON advisor config
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    config: Option<PathBuf>,
    #[structopt(flatten)]
    verbosity: Verbosity,
}

/// Lists the available convolution kernels
#[derive(Debug, StructOpt)]
struct KernelsOpts {
    #[structopt(flatten)]
    verbosity: Verbosity,
}

/// Visualize what the layers of a convolutional neural network do to an image.
#[derive(Debug, StructOpt)]
#[structopt(name = "LayerScope")]
enum Layerscope {
    #[structopt(
        name = "process",
        about = "Runs a list of layers on an image and writes every intermediate result."
    )]
    Process(ProcessOpts),
    #[structopt(
        name = "suggest",
        about = "Suggests a list of layers for an image. Without a suggestion service, \
        a fixed template is returned."
    )]
    Suggest(SuggestOpts),
    #[structopt(name = "kernels", about = "Lists the available convolution kernels.")]
    Kernels(KernelsOpts),
}

/// Trait for the subcommands that layerscope uses
trait LayerscopeOpts {
    /// Performs the subcommand
    fn run(&self) -> CliResult;
    /// Returns the verbosity command
    fn get_verbosity(&self) -> &Verbosity;
    /// Sets up logging
    fn setup_env_logger(&self) -> CliResult {
        let mut builder = Builder::from_default_env();

        builder
            .filter(None, self.get_verbosity().log_level().to_level_filter())
            .init();

        Ok(())
    }
}

impl LayerscopeOpts for ProcessOpts {
    fn run(&self) -> CliResult {
        let image = read_image(&self.image)?;
        let layers = read_layers(&self.layers)?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let records = match Pipeline::from_specs(&layers).and_then(|p| p.run(&image, &mut rng)) {
            Ok(records) => records,
            Err(err) => {
                if self.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&ErrorResponse::from_pipeline_error(&err))?
                    );
                }
                return Err(CliError::from(err).into());
            }
        };

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| default_output_dir(&self.image));
        let written = write_layer_images(&records, &output)?;
        info!("Wrote {} layer images to {}", written.len(), output.display());

        if self.json {
            let response = ProcessResponse::from_records(&records, &PngBase64Coder::new())
                .map_err(CliError::from)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print!("{}", format_table(&records));
        }
        Ok(())
    }

    fn get_verbosity(&self) -> &Verbosity {
        &self.verbosity
    }
}

impl LayerscopeOpts for SuggestOpts {
    fn run(&self) -> CliResult {
        let config = match &self.config {
            Some(path) => AdvisorConfig::from_path(path).map_err(CliError::from)?,
            None => AdvisorConfig::default(),
        };
        let mut advisor = Advisor::new(config).map_err(CliError::from)?;

        let bytes = fs::read(&self.image)?;
        let suggestion = advisor.suggest(&bytes).map_err(CliError::from)?;
        println!("{}", serde_json::to_string_pretty(&suggestion)?);
        Ok(())
    }

    fn get_verbosity(&self) -> &Verbosity {
        &self.verbosity
    }
}

impl LayerscopeOpts for KernelsOpts {
    fn run(&self) -> CliResult {
        print!("{}", kernel_table());
        Ok(())
    }

    fn get_verbosity(&self) -> &Verbosity {
        &self.verbosity
    }
}

impl LayerscopeOpts for Layerscope {
    fn run(&self) -> CliResult {
        match self {
            Layerscope::Process(c) => c.run(),
            Layerscope::Suggest(c) => c.run(),
            Layerscope::Kernels(c) => c.run(),
        }
    }

    fn get_verbosity(&self) -> &Verbosity {
        match self {
            Layerscope::Process(c) => c.get_verbosity(),
            Layerscope::Suggest(c) => c.get_verbosity(),
            Layerscope::Kernels(c) => c.get_verbosity(),
        }
    }
}

fn main() -> CliResult {
    let args = Layerscope::from_args();
    args.setup_env_logger()?;
    args.run()
}
