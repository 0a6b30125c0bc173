use crate::remote::{ServerDescription, DEFAULT_SERVER_PORT};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_J2K_BANDWIDTH: u32 = 250_000_000;

/// Encoding settings shared by every frame of a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// 0 for sRGB, 1 for Rec. 709.
    pub colour_lut_index: usize,
    /// Bits per second.
    pub j2k_bandwidth: u32,
    /// Port every remote worker listens on.
    pub server_port: u16,
    pub servers: Vec<ServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            colour_lut_index: 0,
            j2k_bandwidth: DEFAULT_J2K_BANDWIDTH,
            server_port: DEFAULT_SERVER_PORT,
            servers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    1
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Malformed config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn servers(&self) -> Vec<ServerDescription> {
        self.servers
            .iter()
            .map(|server| ServerDescription::new(server.host.clone(), self.server_port))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.j2k_bandwidth, 250_000_000);
        assert_eq!(config.server_port, 6192);
        assert!(config.servers().is_empty());
    }

    #[test]
    fn servers_use_the_shared_port() {
        let config = Config::from_toml(
            r#"
            colour_lut_index = 1
            j2k_bandwidth = 100000000
            server_port = 7000

            [[servers]]
            host = "render1"
            threads = 8

            [[servers]]
            host = "10.0.0.7"
            "#,
        )
        .unwrap();
        assert_eq!(config.colour_lut_index, 1);
        assert_eq!(config.j2k_bandwidth, 100_000_000);
        assert_eq!(config.servers[0].threads, 8);
        assert_eq!(config.servers[1].threads, 1);
        assert_eq!(
            config.servers(),
            vec![
                ServerDescription::new("render1", 7000),
                ServerDescription::new("10.0.0.7", 7000)
            ]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("bandwidth = 3").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_port = 6000").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server_port, 6000);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = Config::from_file(Path::new("/nonexistent/j2k.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/j2k.toml"));
    }
}
