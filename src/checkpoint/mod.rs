//! Checkpoint loading.
//!
//! The catalog's checkpoints are TorchScript archives: zip files embedding
//! both the traced module structure and its parameters. Only that convention
//! is supported; plain weights-only checkpoints are rejected rather than
//! parsed with a fallback.

pub mod key;

use crate::error::{ConvertError, Result};
use candle_core::Tensor;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Scalar entries some checkpoints carry alongside the weights. They duplicate
/// config fields the introspector recomputes and must not reach the emitted
/// weights file.
pub const LEGACY_METADATA_KEYS: [&str; 3] = ["input_resolution", "context_length", "vocab_size"];

/// A flat mapping from dotted parameter names to tensors.
#[derive(Debug)]
pub struct StateDict {
    tensors: HashMap<String, Tensor>,
}

impl StateDict {
    pub fn new(tensors: HashMap<String, Tensor>) -> Self {
        Self { tensors }
    }

    pub fn from_pairs(pairs: Vec<(String, Tensor)>) -> Self {
        Self {
            tensors: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn tensors(&self) -> &HashMap<String, Tensor> {
        &self.tensors
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Drop the legacy scalar metadata entries, if present.
    ///
    /// This is a separate, explicit step rather than a side effect of config
    /// inference, so the caller decides when the mapping changes hands.
    pub fn without_legacy_metadata(mut self) -> Self {
        for name in LEGACY_METADATA_KEYS {
            if self.tensors.remove(name).is_some() {
                tracing::debug!(key = name, "dropped legacy metadata entry");
            }
        }
        self
    }
}

/// Deserialize a downloaded checkpoint into its parameter mapping.
pub fn load(path: &Path) -> Result<StateDict> {
    sniff_torchscript_archive(path)?;

    let pairs =
        candle_core::pickle::read_all(path).map_err(|err| ConvertError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: format!("failed to read archived parameters: {err}"),
        })?;

    if pairs.is_empty() {
        return Err(ConvertError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "archive contains no parameters".to_string(),
        });
    }

    tracing::debug!(path = %path.display(), tensors = pairs.len(), "loaded checkpoint");
    Ok(StateDict::from_pairs(pairs))
}

/// Check that the file has the TorchScript archive shape before handing it to
/// the pickle reader: a zip container with both a `data.pkl` and a
/// `constants.pkl` entry. Weights-only checkpoints lack the latter.
fn sniff_torchscript_archive(path: &Path) -> Result<()> {
    let file = File::open(path)?;
    let archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|_| ConvertError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "not a zip-contained checkpoint archive".to_string(),
        })?;

    let has_entry = |name: &str| {
        archive
            .file_names()
            .any(|entry| entry == name || entry.ends_with(&format!("/{name}")))
    };

    if !has_entry("data.pkl") || !has_entry("constants.pkl") {
        return Err(ConvertError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "archive is not a traced module (weights-only checkpoint?)".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[&str]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for entry in entries {
            writer
                .start_file(*entry, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"\x80\x02.").unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_rejects_non_zip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pt");
        std::fs::write(&path, b"not an archive").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_rejects_weights_only_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pt");
        write_zip(&path, &["archive/data.pkl", "archive/data/0"]);

        let err = load(&path).unwrap_err();
        match err {
            ConvertError::UnsupportedFormat { reason, .. } => {
                assert!(reason.contains("traced"), "unexpected reason: {reason}")
            }
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_undecodable_traced_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pt");
        write_zip(&path, &["RN50/data.pkl", "RN50/constants.pkl"]);

        // Passes the archive-shape check but the pickle payload is garbage.
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_without_legacy_metadata() {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        for name in ["text_projection", "input_resolution", "context_length", "vocab_size"] {
            tensors.insert(
                name.to_string(),
                Tensor::zeros(1, DType::F32, &device).unwrap(),
            );
        }
        let state = StateDict::new(tensors).without_legacy_metadata();

        assert_eq!(state.len(), 1);
        assert!(state.contains("text_projection"));
        for name in LEGACY_METADATA_KEYS {
            assert!(!state.contains(name));
        }
    }

    #[test]
    fn test_without_legacy_metadata_is_noop_when_absent() {
        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "ln_final.weight".to_string(),
            Tensor::zeros(4, DType::F32, &device).unwrap(),
        );
        let state = StateDict::new(tensors).without_legacy_metadata();
        assert_eq!(state.len(), 1);
    }
}
