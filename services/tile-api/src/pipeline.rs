//! Request orchestration: cache lookup, fetch, render, persist.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use fits_parser::FitsImage;
use metrics::{counter, histogram};
use renderer::{render_cutout, RenderOptions};
use sky_common::{CacheKey, CacheStatus, CutoutProduct, CutoutRequest, SkyError, SkyResult};
use storage::{ArtifactPaths, CacheEntry, CutoutCache};
use tracing::{debug, error, info, instrument, warn};

use crate::upstream::SurveyClient;

/// Produces cached cutout figures for validated requests.
pub struct TilePipeline {
    cache: CutoutCache,
    client: Arc<dyn SurveyClient>,
    render: RenderOptions,
}

impl TilePipeline {
    pub fn new(cache: CutoutCache, client: Arc<dyn SurveyClient>, render: RenderOptions) -> Self {
        Self {
            cache,
            client,
            render,
        }
    }

    pub fn cache(&self) -> &CutoutCache {
        &self.cache
    }

    /// Return the cached product for `request`, producing it if needed.
    ///
    /// With `overwrite` unset, existing artifacts are reused; a raw cutout
    /// without its figure is re-rendered without contacting the survey
    /// service. Concurrent requests for one key share a single production.
    #[instrument(skip(self, request), fields(key = %request.cache_key(), overwrite = request.overwrite()))]
    pub async fn run(&self, request: &CutoutRequest) -> SkyResult<CutoutProduct> {
        let started = Instant::now();
        let key = request.cache_key();

        let result = self.produce(request, &key, started).await;
        match &result {
            Ok(product) => {
                counter!("tile_requests_total", "outcome" => "ok").increment(1);
                counter!("tile_cache_total", "status" => product.cache_status.as_str()).increment(1);
                info!(
                    status = %product.cache_status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tile ready"
                );
            }
            Err(e) => {
                counter!("tile_requests_total", "outcome" => e.error_code()).increment(1);
                if e.is_client_error() {
                    warn!(error = %e, request = ?request, "Tile request rejected");
                } else {
                    error!(error = %e, request = ?request, "Tile request failed");
                }
            }
        }
        result
    }

    async fn produce(
        &self,
        request: &CutoutRequest,
        key: &CacheKey,
        started: Instant,
    ) -> SkyResult<CutoutProduct> {
        let mut guard = self.cache.lock(key).await;

        if guard.produced_since(started) {
            debug!(state = "coalesced", "Reusing artifacts produced while waiting");
            return Ok(self.product(request, self.cache.paths(key), CacheStatus::Coalesced));
        }

        if !request.overwrite() {
            match self.cache.lookup(key).await {
                CacheEntry::Complete(paths) => {
                    debug!(state = "cache_hit", "Serving cached artifacts");
                    return Ok(self.product(request, paths, CacheStatus::Hit));
                }
                CacheEntry::RawOnly(_) => {
                    debug!(state = "rerendering", "Raw cutout cached, figure missing");
                    match self.load_cached_image(key).await {
                        Ok(image) => {
                            let png = self.render(request, image).await?;
                            let paths = self.cache.persist_rendered(key, &png).await?;
                            guard.mark_produced();
                            return Ok(self.product(request, paths, CacheStatus::Rerendered));
                        }
                        Err(e) => {
                            warn!(error = %e, "Cached raw cutout unusable, fetching again");
                        }
                    }
                }
                CacheEntry::Missing(_) => {}
            }
        }

        debug!(state = "fetching", "Requesting cutout from survey service");
        let fetch_started = Instant::now();
        let cutout = self.client.fetch(request).await?;
        histogram!("upstream_fetch_seconds").record(fetch_started.elapsed().as_secs_f64());

        debug!(state = "rendering", "Rendering figure");
        let raw: Bytes = cutout.bytes;
        let png = self.render(request, cutout.image).await?;

        debug!(state = "persisting", "Writing artifacts");
        let paths = self.cache.persist(key, &raw, &png).await?;
        guard.mark_produced();

        Ok(self.product(request, paths, CacheStatus::Fetched))
    }

    /// Read and decode the cached raw cutout on the blocking pool.
    async fn load_cached_image(&self, key: &CacheKey) -> SkyResult<FitsImage> {
        let raw = self.cache.read_raw(key).await?;
        let image = tokio::task::spawn_blocking(move || FitsImage::from_bytes(&raw))
            .await
            .map_err(|e| SkyError::Internal(format!("Decode task failed: {}", e)))??;
        Ok(image)
    }

    /// Render on the blocking pool.
    async fn render(&self, request: &CutoutRequest, image: FitsImage) -> SkyResult<Vec<u8>> {
        let options = self
            .render
            .clone()
            .with_title(format!("{} - {}", request.survey(), request.canonical_position()));

        let render_started = Instant::now();
        let png = tokio::task::spawn_blocking(move || render_cutout(&image, &options))
            .await
            .map_err(|e| SkyError::Internal(format!("Render task failed: {}", e)))??;
        histogram!("render_seconds").record(render_started.elapsed().as_secs_f64());

        Ok(png)
    }

    fn product(&self, request: &CutoutRequest, paths: ArtifactPaths, status: CacheStatus) -> CutoutProduct {
        CutoutProduct {
            raw_path: paths.raw,
            rendered_path: paths.rendered,
            position: request.canonical_position(),
            survey: request.survey().to_string(),
            width_deg: request.width_deg(),
            height_deg: request.height_deg(),
            pixels: request.pixels(),
            cache_status: status,
        }
    }
}
