//! Architecture introspection.
//!
//! Reconstructs the structural hyperparameters of the model that produced a
//! checkpoint purely from parameter names and tensor shapes, with no
//! out-of-band metadata. The derivation is deterministic: the same mapping
//! always yields the same config.

use crate::checkpoint::key::ParamKey;
use crate::checkpoint::StateDict;
use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Presence of this key discriminates the two vision tower families.
const VISUAL_PROJECTION: &str = "visual.proj";
const PATCH_CONV: &str = "visual.conv1.weight";
const VISUAL_POSITIONS: &str = "visual.positional_embedding";
const STEM_CONV: &str = "visual.layer1.0.conv1.weight";
const ATTNPOOL_POSITIONS: &str = "visual.attnpool.positional_embedding";

/// Attention head width shared by every catalog model.
const HEAD_DIM: usize = 64;

/// Depth of the vision tower: a single block count for the transformer
/// family, one count per stage for the residual family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisionLayers {
    Transformer(usize),
    Residual([usize; 4]),
}

/// Hyperparameters recovered from a checkpoint.
///
/// Field declaration order is the order keys appear in the emitted YAML
/// document, so new fields must be added in place, not appended blindly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub embed_dim: usize,
    pub image_resolution: usize,
    pub vision_layers: VisionLayers,
    pub vision_width: usize,
    pub vision_patch_size: Option<usize>,
    pub context_length: usize,
    pub vocab_size: usize,
    pub transformer_width: usize,
    pub transformer_heads: usize,
    pub transformer_layers: usize,
    /// Set by the emitter once the weights file location is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretrained_weights_path: Option<String>,
}

/// Derive the architecture config from a raw parameter mapping.
pub fn infer_config(state: &StateDict) -> Result<ModelConfig> {
    let (vision_layers, vision_width, vision_patch_size, image_resolution) =
        if state.contains(VISUAL_PROJECTION) {
            infer_transformer_tower(state)?
        } else {
            infer_residual_tower(state)?
        };

    let embed_dim = dim(state, "text_projection", 1)?;
    let context_length = dim(state, "positional_embedding", 0)?;
    let vocab_size = dim(state, "token_embedding.weight", 0)?;
    let transformer_width = dim(state, "ln_final.weight", 0)?;
    let transformer_heads = transformer_width / HEAD_DIM;
    let transformer_layers = distinct_block_indices(state, &["transformer", "resblocks"]);

    Ok(ModelConfig {
        embed_dim,
        image_resolution,
        vision_layers,
        vision_width,
        vision_patch_size,
        context_length,
        vocab_size,
        transformer_width,
        transformer_heads,
        transformer_layers,
        pretrained_weights_path: None,
    })
}

type TowerShape = (VisionLayers, usize, Option<usize>, usize);

/// Patch-embedding vision tower: width and patch size come from the stem
/// convolution, depth from the residual-block attention weights, resolution
/// from the positional-embedding grid.
fn infer_transformer_tower(state: &StateDict) -> Result<TowerShape> {
    let conv1 = dims(state, PATCH_CONV)?;
    let (vision_width, vision_patch_size) = match (conv1.first(), conv1.last()) {
        (Some(&width), Some(&patch)) => (width, patch),
        _ => {
            return Err(ConvertError::StructuralAssertion(format!(
                "{PATCH_CONV:?} has no dimensions"
            )))
        }
    };

    let vision_layers = state
        .keys()
        .filter(|name| {
            let key = ParamKey::parse(name);
            key.starts_with(&["visual"]) && key.ends_with(&["attn", "in_proj_weight"])
        })
        .count();

    let positions = dim(state, VISUAL_POSITIONS, 0)?;
    let grid_size = embedded_grid_size(positions);
    let image_resolution = vision_patch_size * grid_size;

    Ok((
        VisionLayers::Transformer(vision_layers),
        vision_width,
        Some(vision_patch_size),
        image_resolution,
    ))
}

/// Residual vision tower: per-stage depths come from the distinct block
/// indices under `visual.layer1` through `visual.layer4`, resolution from the
/// attention-pool positional embedding (one slot per output cell plus one for
/// the pooled query, hence the `k^2 + 1` length invariant).
fn infer_residual_tower(state: &StateDict) -> Result<TowerShape> {
    let mut stage_depths = [0usize; 4];
    for (stage, depth) in stage_depths.iter_mut().enumerate() {
        let stage_name = format!("layer{}", stage + 1);
        let blocks: BTreeSet<usize> = state
            .keys()
            .filter_map(|name| {
                let key = ParamKey::parse(name);
                if key.segment(0) == Some("visual") && key.segment(1) == Some(&stage_name) {
                    key.block_index()
                } else {
                    None
                }
            })
            .collect();
        *depth = blocks.len();
    }

    let vision_width = dim(state, STEM_CONV, 0)?;

    let positions = dim(state, ATTNPOOL_POSITIONS, 0)?;
    let output_width = embedded_grid_size(positions);
    if output_width * output_width + 1 != positions {
        return Err(ConvertError::StructuralAssertion(format!(
            "attention-pool positional embedding has length {positions}, not of the form k^2 + 1"
        )));
    }
    let image_resolution = output_width * 32;

    Ok((
        VisionLayers::Residual(stage_depths),
        vision_width,
        None,
        image_resolution,
    ))
}

/// Side length of the square grid behind a positional-embedding table whose
/// first slot is the class/query token.
fn embedded_grid_size(positions: usize) -> usize {
    ((positions.saturating_sub(1)) as f64).sqrt().round() as usize
}

fn distinct_block_indices(state: &StateDict, prefix: &[&str]) -> usize {
    let blocks: BTreeSet<usize> = state
        .keys()
        .filter_map(|name| {
            let key = ParamKey::parse(name);
            if key.starts_with(prefix) {
                key.block_index()
            } else {
                None
            }
        })
        .collect();
    blocks.len()
}

fn dims<'a>(state: &'a StateDict, name: &str) -> Result<&'a [usize]> {
    state.get(name).map(|tensor| tensor.dims()).ok_or_else(|| {
        ConvertError::StructuralAssertion(format!("required tensor {name:?} is missing"))
    })
}

fn dim(state: &StateDict, name: &str, axis: usize) -> Result<usize> {
    let shape = dims(state, name)?;
    shape.get(axis).copied().ok_or_else(|| {
        ConvertError::StructuralAssertion(format!(
            "tensor {name:?} has rank {}, expected at least {}",
            shape.len(),
            axis + 1
        ))
    })
}
