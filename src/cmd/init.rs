//! Database initialization command: `cardboard init`.

use std::path::Path;

use anyhow::Result;
use cardboard::config::{CardboardToml, Overrides};

pub fn cmd_init(config_path: &Path, overrides: &Overrides) -> Result<()> {
    let config = CardboardToml::resolve(config_path, overrides)?;
    let server = config.server_config();

    let (_db, user) = cardboard::board::server::open_database(&server)?;
    println!("Database initialized at {}", server.db_path.display());
    println!("Default user: {} (id {})", user.username, user.id);
    Ok(())
}
