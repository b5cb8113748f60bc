//! Application state and shared resources.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::CutoutCache;
use tracing::info;

use crate::config::ServiceConfig;
use crate::pipeline::TilePipeline;
use crate::proxy::ProxyClient;
use crate::upstream::{SkyViewClient, SurveyClient};

/// Shared application state.
pub struct AppState {
    pub config: ServiceConfig,
    pub pipeline: Arc<TilePipeline>,
    /// Present only when the proxy is enabled.
    pub proxy: Option<ProxyClient>,
    pub prometheus: PrometheusHandle,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state backed by the real SkyView client.
    pub fn new(config: ServiceConfig, prometheus: PrometheusHandle) -> Result<Self> {
        let client = SkyViewClient::new(&config.upstream).context("Failed to create SkyView client")?;
        info!(endpoint = %client.endpoint(), "Configured SkyView client");
        Self::with_client(config, Arc::new(client), prometheus)
    }

    /// Build state around any survey client.
    pub fn with_client(
        config: ServiceConfig,
        client: Arc<dyn SurveyClient>,
        prometheus: PrometheusHandle,
    ) -> Result<Self> {
        let cache = CutoutCache::new(&config.cache.dir);
        info!(cache_dir = %config.cache.dir.display(), "Using cutout cache directory");

        let pipeline = Arc::new(TilePipeline::new(cache, client, config.render.options()));

        let proxy = if config.proxy.enabled {
            info!(allow_hosts = ?config.proxy.allow_hosts, "Proxy endpoint enabled");
            Some(ProxyClient::new(&config.proxy).context("Failed to create proxy client")?)
        } else {
            None
        };

        Ok(Self {
            config,
            pipeline,
            proxy,
            prometheus,
            started_at: Utc::now(),
        })
    }
}
