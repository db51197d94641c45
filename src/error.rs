//! Error taxonomy for the conversion pipeline.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("model {name:?} is not in the catalog; available models: {available}")]
    UnknownModel { name: String, available: String },

    #[error("{url:?} does not embed a SHA-256 digest as its second-to-last path segment")]
    MalformedUrl { url: String },

    #[error("{} exists and is not a regular file", path.display())]
    PathConflict { path: PathBuf },

    #[error("{} was downloaded but its SHA-256 checksum does not match (expected {expected}, got {actual})", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{}: {reason}; only TorchScript checkpoint archives are supported", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("structural assertion failed: {0}")]
    StructuralAssertion(String),

    #[error(transparent)]
    Transport(Box<ureq::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("tensor serialization failed: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("config serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("converting {name}: {source}")]
    Model {
        name: String,
        #[source]
        source: Box<ConvertError>,
    },

    #[error("conversion failed for {} model(s): {}", models.len(), models.join(", "))]
    Failed { models: Vec<String> },
}

impl From<ureq::Error> for ConvertError {
    fn from(err: ureq::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}
