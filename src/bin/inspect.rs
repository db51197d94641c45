//! Read-back validation for converted checkpoints.
//!
//! Loads an emitted YAML model config, opens the safetensors file it
//! references, and checks that the weights actually look like the model the
//! config describes:
//!
//! ```bash
//! clipforge-inspect model/model_configs/RN50.yaml
//! ```

use anyhow::{bail, Context, Result};
use clipforge::introspect::{ModelConfig, VisionLayers};
use safetensors::SafeTensors;
use std::path::{Path, PathBuf};

fn parse_args() -> Vec<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut paths = Vec::new();

    for arg in &args[1..] {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("clipforge-inspect {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => {
                eprintln!("Unknown argument: {flag}");
                print_help();
                std::process::exit(1);
            }
            path => paths.push(PathBuf::from(path)),
        }
    }

    if paths.is_empty() {
        eprintln!("Error: expected at least one model config path");
        print_help();
        std::process::exit(1);
    }
    paths
}

fn print_help() {
    println!(
        r#"clipforge-inspect - validate converted CLIP checkpoints

USAGE:
    clipforge-inspect CONFIG.yaml [CONFIG.yaml ...]

OPTIONS:
    --version, -V       Show version
    --help, -h          Show this help message"#
    );
}

fn main() -> Result<()> {
    clipforge::logging::init();

    for path in parse_args() {
        inspect(&path)?;
    }
    Ok(())
}

fn inspect(config_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    let config: ModelConfig =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?;

    let Some(weights_path) = config.pretrained_weights_path.as_deref() else {
        bail!(
            "{} does not reference a weights file; was it emitted by clipforge?",
            config_path.display()
        );
    };

    let bytes = std::fs::read(weights_path).with_context(|| format!("reading {weights_path}"))?;
    let tensors =
        SafeTensors::deserialize(&bytes).with_context(|| format!("parsing {weights_path}"))?;

    check_tensors(&config, &tensors)?;

    let parameter_count: usize = tensors
        .tensors()
        .iter()
        .map(|(_, view)| view.shape().iter().product::<usize>())
        .sum();

    println!("{}", config_path.display());
    println!("  weights:      {weights_path}");
    println!("  tensors:      {}", tensors.len());
    println!("  parameters:   {parameter_count}");
    println!("  resolution:   {}", config.image_resolution);
    match config.vision_layers {
        VisionLayers::Transformer(layers) => {
            println!("  vision tower: transformer, {layers} layers");
        }
        VisionLayers::Residual(stages) => {
            println!("  vision tower: residual, stages {stages:?}");
        }
    }
    println!(
        "  text tower:   width {}, {} heads, {} layers",
        config.transformer_width, config.transformer_heads, config.transformer_layers
    );
    Ok(())
}

/// The tensors the config was derived from must exist in the weights file
/// and agree with it.
fn check_tensors(config: &ModelConfig, tensors: &SafeTensors) -> Result<()> {
    let stem = match config.vision_layers {
        VisionLayers::Transformer(_) => "visual.conv1.weight",
        VisionLayers::Residual(_) => "visual.layer1.0.conv1.weight",
    };
    for name in ["text_projection", "ln_final.weight", stem] {
        if tensors.tensor(name).is_err() {
            bail!("weights file is missing tensor {name:?}");
        }
    }

    let ln_final = tensors
        .tensor("ln_final.weight")
        .context("weights file is missing tensor \"ln_final.weight\"")?;
    let width = ln_final.shape().first().copied().unwrap_or(0);
    if width != config.transformer_width {
        bail!(
            "config says transformer_width = {}, but ln_final.weight has length {width}",
            config.transformer_width
        );
    }
    Ok(())
}
