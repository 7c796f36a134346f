//! Proxy configuration loading and types.

use anyhow::{Context, Result};
use clap::Args;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use tile_common::LayerConfigTable;

/// First port tried when binding the proxy listener.
pub const DEFAULT_BASE_PORT: u16 = 19876;

/// Number of consecutive ports tried before giving up.
pub const DEFAULT_PORT_RANGE: u16 = 100;

pub const DEFAULT_CACHE_CAPACITY: usize = 512;

pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_USER_AGENT: &str = concat!("boundary-tile-proxy/", env!("CARGO_PKG_VERSION"));

/// Style table shipped with the proxy.
pub const EMBEDDED_STYLE_CONFIG: &str = include_str!("../../../config/layer_configs.json");

/// Settings for one proxy instance.
#[derive(Args, Debug, Clone)]
pub struct ProxyConfig {
    /// Address the proxy listens on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST), env = "TILE_PROXY_HOST")]
    pub host: IpAddr,

    /// First port to try
    #[arg(long, default_value_t = DEFAULT_BASE_PORT, env = "TILE_PROXY_BASE_PORT")]
    pub base_port: u16,

    /// How many consecutive ports to try from the base port
    #[arg(long, default_value_t = DEFAULT_PORT_RANGE, env = "TILE_PROXY_PORT_RANGE")]
    pub port_range: u16,

    /// PMTiles archive with correction layers (corrections disabled when absent)
    #[arg(long, env = "TILE_PROXY_ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Style configuration JSON (defaults to the embedded table)
    #[arg(long, env = "TILE_PROXY_STYLE_CONFIG")]
    pub style_config: Option<PathBuf>,

    /// Maximum number of tiles kept in the correction cache
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "TILE_PROXY_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// Upstream fetch timeout in seconds
    #[arg(long, default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS, env = "TILE_PROXY_UPSTREAM_TIMEOUT")]
    pub upstream_timeout_secs: u64,

    /// User-Agent sent to tile servers
    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "TILE_PROXY_USER_AGENT")]
    pub user_agent: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: DEFAULT_BASE_PORT,
            port_range: DEFAULT_PORT_RANGE,
            archive: None,
            style_config: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProxyConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Load the style table from `style_config`, or the embedded table.
    ///
    /// Any malformed record aborts the load.
    pub fn load_style_table(&self) -> Result<LayerConfigTable> {
        let table = match &self.style_config {
            Some(path) => LayerConfigTable::from_file(path)
                .with_context(|| format!("Failed to load style config: {}", path.display()))?,
            None => LayerConfigTable::from_json(EMBEDDED_STYLE_CONFIG)
                .context("Embedded style config is invalid")?,
        };

        tracing::info!(
            providers = table.len(),
            source = %self
                .style_config
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "embedded".to_string()),
            "Loaded style configuration"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        proxy: ProxyConfig,
    }

    #[test]
    fn test_cli_overrides() {
        let cli = TestCli::parse_from([
            "tile-proxy",
            "--base-port",
            "20000",
            "--port-range",
            "3",
            "--cache-capacity",
            "8",
        ]);
        assert_eq!(cli.proxy.base_port, 20000);
        assert_eq!(cli.proxy.port_range, 3);
        assert_eq!(cli.proxy.cache_capacity, 8);
    }

    #[test]
    fn test_embedded_table_loads() {
        let table = ProxyConfig::default().load_style_table().unwrap();
        assert!(!table.is_empty());
        assert!(table
            .match_url("https://tile.openstreetmap.org/3/4/2.png")
            .is_some());
    }

    #[test]
    fn test_style_file_errors_abort() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[{ "id": "x", "tileUrlTemplates": ["https://x/{q}.png"] }]"#)
            .unwrap();
        let config = ProxyConfig {
            style_config: Some(file.path().to_path_buf()),
            ..ProxyConfig::default()
        };
        let err = config.load_style_table().unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid configuration"));

        let missing = ProxyConfig {
            style_config: Some(PathBuf::from("/nonexistent/styles.json")),
            ..ProxyConfig::default()
        };
        assert!(missing.load_style_table().is_err());
    }
}
