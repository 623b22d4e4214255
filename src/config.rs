//! Configuration for the board server, read from `cardboard.toml`.
//!
//! Values are layered, highest precedence first:
//! CLI flag → `CARDBOARD_*` environment variable → file → built-in default.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3001
//! dev_mode = false
//!
//! [database]
//! path = ".cardboard/cardboard.db"
//!
//! [auth]
//! default_username = "demo"
//! default_email = "demo@cardboard.local"
//!
//! [log]
//! level = "info"
//! format = "pretty"
//! directory = ".cardboard/logs"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::board::server::ServerConfig;

pub const CONFIG_FILE: &str = "cardboard.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Console log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: pretty, json", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Enables permissive CORS for a separately served front-end
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".cardboard/cardboard.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// The user that requests without an `X-User-Id` header act as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default = "default_username")]
    pub default_username: String,
    #[serde(default = "default_email")]
    pub default_email: String,
}

fn default_username() -> String {
    "demo".to_string()
}

fn default_email() -> String {
    "demo@cardboard.local".to_string()
}

impl AuthSection {
    /// Email for the seeded user.
    ///
    /// A renamed user keeping the stock email gets `<username>@cardboard.local`,
    /// since emails are unique per user.
    pub fn effective_email(&self) -> String {
        if self.default_email == default_email() && self.default_username != default_username() {
            format!("{}@cardboard.local", self.default_username.trim())
        } else {
            self.default_email.clone()
        }
    }
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            default_username: default_username(),
            default_email: default_email(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSection {
    /// Used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// When set, events are also written to a daily rolling file here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

/// Root of `cardboard.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardboardToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub log: LogSection,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub dev_mode: bool,
    pub log_level: Option<String>,
}

impl CardboardToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse cardboard.toml")
    }

    /// Load from `path`, or defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize cardboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `CARDBOARD_*` variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CARDBOARD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CARDBOARD_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid CARDBOARD_PORT '{}'", port))?;
        }
        if let Some(path) = lookup("CARDBOARD_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(level) = lookup("CARDBOARD_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(format) = lookup("CARDBOARD_LOG_FORMAT") {
            self.log.format = format.parse()?;
        }
        if let Some(user) = lookup("CARDBOARD_DEFAULT_USER") {
            self.auth.default_username = user;
        }
        if let Some(email) = lookup("CARDBOARD_DEFAULT_EMAIL") {
            self.auth.default_email = email;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(ref host) = overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(ref path) = overrides.db_path {
            self.database.path = path.clone();
        }
        if overrides.dev_mode {
            self.server.dev_mode = true;
        }
        if let Some(ref level) = overrides.log_level {
            self.log.level = level.clone();
        }
    }

    /// Resolve every layer: file at `path`, process environment, then CLI.
    pub fn resolve(path: &Path, overrides: &Overrides) -> Result<Self> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            db_path: self.database.path.clone(),
            dev_mode: self.server.dev_mode,
            default_username: self.auth.default_username.clone(),
            default_email: self.auth.effective_email(),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0: the OS will pick a random port".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            warnings.push("database.path is empty".to_string());
        }
        if self.auth.default_username.trim().is_empty() {
            warnings.push("auth.default_username is empty".to_string());
        }
        if !self.auth.default_email.contains('@') {
            warnings.push(format!(
                "auth.default_email '{}' does not look like an email address",
                self.auth.default_email
            ));
        }
        if self.log.level.trim().is_empty() || EnvFilter::try_new(&self.log.level).is_err() {
            warnings.push(format!(
                "Invalid log.level '{}'. Use a level ({}) or filter directives such as 'cardboard=debug'",
                self.log.level,
                LOG_LEVELS.join(", ")
            ));
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = CardboardToml::parse("").unwrap();
        assert_eq!(config, CardboardToml::default());
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.database.path, PathBuf::from(".cardboard/cardboard.db"));
        assert_eq!(config.auth.default_username, "demo");
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert!(config.log.directory.is_none());
    }

    #[test]
    fn test_parse_partial_sections() {
        let config = CardboardToml::parse(
            r#"
[server]
port = 8080
dev_mode = true

[log]
format = "json"
directory = "/var/log/cardboard"
"#,
        )
        .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.dev_mode);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(
            config.log.directory,
            Some(PathBuf::from("/var/log/cardboard"))
        );
    }

    #[test]
    fn test_parse_invalid_toml() {
        assert!(CardboardToml::parse("[server\nport = ").is_err());
        assert!(CardboardToml::parse("[server]\nport = \"high\"").is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = CardboardToml::default();
        config.server.port = 4000;
        config.auth.default_username = "alice".to_string();
        config.save(&path).unwrap();

        assert_eq!(CardboardToml::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let config = CardboardToml::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CardboardToml::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = CardboardToml::parse("[server]\nport = 8080").unwrap();
        config
            .apply_env(env_of(&[
                ("CARDBOARD_PORT", "9090"),
                ("CARDBOARD_DB_PATH", "/tmp/board.db"),
                ("CARDBOARD_LOG_FORMAT", "json"),
                ("CARDBOARD_DEFAULT_USER", "alice"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.path, PathBuf::from("/tmp/board.db"));
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.auth.default_username, "alice");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_env_invalid_port_is_error() {
        let mut config = CardboardToml::default();
        let err = config
            .apply_env(env_of(&[("CARDBOARD_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(err.to_string().contains("CARDBOARD_PORT"));
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = CardboardToml::default();
        config
            .apply_env(env_of(&[("CARDBOARD_PORT", "9090"), ("CARDBOARD_HOST", "0.0.0.0")]))
            .unwrap();
        config.apply_overrides(&Overrides {
            port: Some(7000),
            dev_mode: true,
            log_level: Some("debug".to_string()),
            ..Default::default()
        });
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.server.dev_mode);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_server_config_from_toml() {
        let mut config = CardboardToml::default();
        config.database.path = PathBuf::from("data/board.db");
        let server = config.server_config();
        assert_eq!(server.port, 3001);
        assert_eq!(server.db_path, PathBuf::from("data/board.db"));
        assert_eq!(server.default_email, "demo@cardboard.local");
    }

    #[test]
    fn test_renamed_user_gets_derived_email() {
        let mut config = CardboardToml::default();
        config
            .apply_env(env_of(&[("CARDBOARD_DEFAULT_USER", "alice")]))
            .unwrap();
        let server = config.server_config();
        assert_eq!(server.default_username, "alice");
        assert_eq!(server.default_email, "alice@cardboard.local");

        config
            .apply_env(env_of(&[("CARDBOARD_DEFAULT_EMAIL", "alice@example.com")]))
            .unwrap();
        assert_eq!(config.server_config().default_email, "alice@example.com");
    }

    #[test]
    fn test_validate_accepts_filter_directives() {
        let mut config = CardboardToml::default();
        config.log.level = "cardboard=debug,tower_http=info".to_string();
        assert!(config.validate().is_empty());

        config.log.level = "WARN".to_string();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_valid() {
        assert!(CardboardToml::default().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_each_problem() {
        let mut config = CardboardToml::default();
        config.server.port = 0;
        config.database.path = PathBuf::new();
        config.auth.default_username = " ".to_string();
        config.log.level = "cardboard=loud".to_string();

        let warnings = config.validate();
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().any(|w| w.contains("server.port")));
        assert!(warnings.iter().any(|w| w.contains("database.path")));
        assert!(warnings.iter().any(|w| w.contains("default_username")));
        assert!(warnings.iter().any(|w| w.contains("loud")));
    }
}
