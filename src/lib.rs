//! Download pretrained CLIP checkpoints and convert them into a plain
//! weights file plus a human-readable config document.
//!
//! The pipeline per catalog entry:
//! 1. [`download`] fetches the TorchScript archive, verified against the
//!    SHA-256 digest embedded in its URL (cached copies are reused).
//! 2. [`checkpoint`] deserializes the archive into a parameter mapping.
//! 3. [`introspect`] reconstructs the architecture hyperparameters from
//!    parameter names and tensor shapes alone.
//! 4. [`emit`] writes the weights as safetensors and the config as YAML.
//!
//! [`convert::Converter`] drives the catalog in declaration order.

pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod convert;
pub mod download;
pub mod emit;
pub mod error;
pub mod introspect;
pub mod logging;

pub use config::Config;
pub use convert::Converter;
pub use error::{ConvertError, Result};
