//! Conversion driver.
//!
//! Walks the catalog in declaration order, running each entry through
//! download -> load -> introspect -> emit. The default policy is to abort on
//! the first failing entry so a corrupted catalog never yields a partially
//! consistent output tree; `continue_on_error` trades that for coverage.

use crate::catalog::CatalogEntry;
use crate::checkpoint;
use crate::config::Config;
use crate::download::Downloader;
use crate::emit::{self, EmittedPaths};
use crate::error::{ConvertError, Result};
use crate::introspect;
use tracing::{error, info};

pub struct Converter {
    config: Config,
    downloader: Downloader,
}

impl Converter {
    pub fn new(config: Config) -> Self {
        let downloader = Downloader::new(&config.download);
        Self { config, downloader }
    }

    /// Replace the HTTP transport, e.g. for tests.
    pub fn with_downloader(config: Config, downloader: Downloader) -> Self {
        Self { config, downloader }
    }

    /// Convert every entry, in the order given.
    pub fn convert_all<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a CatalogEntry>,
    ) -> Result<()> {
        let mut failed = Vec::new();
        for entry in entries {
            match self.convert_one(entry) {
                Ok(paths) => {
                    info!(
                        model = entry.name,
                        weights = %paths.weights.display(),
                        config = %paths.config.display(),
                        "conversion finished",
                    );
                }
                Err(err) => {
                    let err = ConvertError::Model {
                        name: entry.name.to_string(),
                        source: Box::new(err),
                    };
                    if !self.config.continue_on_error {
                        return Err(err);
                    }
                    error!(model = entry.name, %err, "conversion failed; continuing");
                    failed.push(entry.name.to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ConvertError::Failed { models: failed })
        }
    }

    /// Run the full pipeline for one catalog entry.
    pub fn convert_one(&self, entry: &CatalogEntry) -> Result<EmittedPaths> {
        info!(model = entry.name, "converting");
        let artifact = self.downloader.acquire(entry.url, &self.config.cache_dir)?;
        let state = checkpoint::load(&artifact)?;
        let model_config = introspect::infer_config(&state)?;
        let state = state.without_legacy_metadata();
        emit::emit(entry.name, &state, &model_config, &self.config)
    }
}
