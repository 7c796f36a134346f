//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;

use tile_common::LayerConfigTable;

use crate::config::ProxyConfig;
use crate::corrector::Corrector;
use crate::metrics::ProxyMetrics;

/// Shared state handed to every request.
pub struct AppState {
    /// Provider styles, read-only after load
    pub styles: Arc<LayerConfigTable>,
    pub corrector: Corrector,
    /// Upstream tile client with the configured timeout and User-Agent
    pub client: reqwest::Client,
    pub metrics: Arc<ProxyMetrics>,
}

impl AppState {
    /// Build state from a loaded style table.
    ///
    /// An unusable archive does not fail construction; corrections are
    /// disabled instead.
    pub fn new(config: &ProxyConfig, styles: LayerConfigTable) -> Result<Self> {
        let client = upstream_client_builder(config)
            .build()
            .context("Failed to build upstream HTTP client")?;
        Ok(Self::with_client(config, styles, client))
    }

    /// Build state around an already configured upstream client.
    pub fn with_client(config: &ProxyConfig, styles: LayerConfigTable, client: reqwest::Client) -> Self {
        Self {
            styles: Arc::new(styles),
            corrector: Corrector::open(config.archive.as_deref(), config.cache_capacity),
            client,
            metrics: Arc::new(ProxyMetrics::new()),
        }
    }

    /// Load the style table named by `config` and build state from it.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let styles = config.load_style_table()?;
        Self::new(config, styles)
    }
}

/// Upstream client settings: request timeout and User-Agent.
pub fn upstream_client_builder(config: &ProxyConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(config.upstream_timeout())
        .user_agent(config.user_agent.clone())
}
