//! HTTP server command: `cardboard serve`.

use std::path::Path;

use anyhow::Result;
use cardboard::config::{CardboardToml, Overrides};

pub async fn cmd_serve(config_path: &Path, overrides: &Overrides) -> Result<()> {
    let config = CardboardToml::resolve(config_path, overrides)?;
    let _log_guard = cardboard::logging::init_tracing(&config.log)?;

    for warning in config.validate() {
        tracing::warn!(%warning, "configuration warning");
    }

    cardboard::board::server::start_server(config.server_config()).await
}
