//! Logging setup.
//!
//! Log level is controlled via the `CLIPFORGE_LOG` environment variable
//! (`debug`, `info`, `warn`, `error`), defaulting to `info`. Events go to
//! stderr so stdout stays clean for the progress display.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    let env_filter =
        EnvFilter::try_from_env("CLIPFORGE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
