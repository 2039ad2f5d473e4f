//! Tool configuration (antora-dev.toml).

use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub generator: GeneratorSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Open a browser tab when the server starts
    #[serde(default = "default_open")]
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: default_open(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GeneratorSettings {
    /// Generator command, e.g. "npx antora"
    #[serde(default = "default_command")]
    pub command: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5353
}
fn default_open() -> bool {
    true
}
fn default_command() -> String {
    "antora".to_string()
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let config = load_config(&temp.path().join("antora-dev.toml")).unwrap();

        assert_eq!(config.server.port, 5353);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.open);
        assert_eq!(config.generator.command, "antora");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("antora-dev.toml");
        fs::write(&path, "[server]\nport = 8080\n\n[generator]\ncommand = \"npx antora\"\n").unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.server.open);
        assert_eq!(config.generator.command, "npx antora");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("antora-dev.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        assert!(load_config(&path).is_err());
    }
}
