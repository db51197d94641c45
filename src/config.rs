use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where downloaded checkpoint archives are cached.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Where converted weights files are written.
    #[serde(default = "default_weights_dir")]
    pub weights_dir: PathBuf,

    /// Where the per-model YAML config documents are written.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Keep converting remaining catalog entries after a failure instead of
    /// aborting on the first one.
    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DownloadConfig {
    /// Seconds before a stalled transfer is abandoned. Unset means the
    /// transfer blocks indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl DownloadConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("pretrained_weights")
}

fn default_weights_dir() -> PathBuf {
    PathBuf::from("pretrained_weights")
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("model/model_configs")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            weights_dir: default_weights_dir(),
            config_dir: default_config_dir(),
            continue_on_error: false,
            download: DownloadConfig::default(),
        }
    }
}

impl Config {
    /// Load `clipforge.toml` from the working directory if present, falling
    /// back to the defaults.
    pub fn load() -> Result<Self> {
        let path = Path::new("clipforge.toml");
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_dir, PathBuf::from("pretrained_weights"));
        assert_eq!(config.weights_dir, PathBuf::from("pretrained_weights"));
        assert_eq!(config.config_dir, PathBuf::from("model/model_configs"));
        assert!(!config.continue_on_error);
        assert_eq!(config.download.timeout(), None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            continue_on_error = true

            [download]
            timeout_secs = 30
            "#,
        )
        .unwrap();
        assert!(config.continue_on_error);
        assert_eq!(config.download.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.weights_dir, PathBuf::from("pretrained_weights"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipforge.toml");
        std::fs::write(&path, "weights_dir = \"out/weights\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weights_dir, PathBuf::from("out/weights"));
        assert_eq!(config.config_dir, PathBuf::from("model/model_configs"));
    }
}
