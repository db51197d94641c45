//! Weights and config emission.
//!
//! The converted parameter mapping lands in a safetensors file, the inferred
//! hyperparameters in a YAML document referencing it. Both filenames derive
//! from the normalized model identifier, so re-converting the same model
//! reproduces the same paths.

use crate::catalog;
use crate::checkpoint::StateDict;
use crate::config::Config;
use crate::error::Result;
use crate::introspect::ModelConfig;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedPaths {
    pub weights: PathBuf,
    pub config: PathBuf,
}

/// Persist the parameter mapping and its inferred config.
pub fn emit(
    name: &str,
    state: &StateDict,
    model_config: &ModelConfig,
    config: &Config,
) -> Result<EmittedPaths> {
    let normalized = catalog::normalize_name(name);

    std::fs::create_dir_all(&config.weights_dir)?;
    let weights = config.weights_dir.join(format!("{normalized}.safetensors"));
    candle_core::safetensors::save(state.tensors(), &weights)?;
    tracing::info!(model = name, path = %weights.display(), "wrote weights");

    let mut document = model_config.clone();
    document.pretrained_weights_path = Some(weights.to_string_lossy().into_owned());

    std::fs::create_dir_all(&config.config_dir)?;
    let config_path = config.config_dir.join(format!("{normalized}.yaml"));
    std::fs::write(&config_path, serde_yaml::to_string(&document)?)?;
    tracing::info!(model = name, path = %config_path.display(), "wrote model config");

    Ok(EmittedPaths {
        weights,
        config: config_path,
    })
}
