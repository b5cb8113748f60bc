//! Shared fixtures for tile-api integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use bytes::Bytes;
use metrics_exporter_prometheus::PrometheusBuilder;
use sky_common::{CutoutRequest, SkyError, SkyResult};
use test_utils::{positions, star_field, FitsFixture};
use tile_api::{
    build_router,
    config::ServiceConfig,
    state::AppState,
    upstream::{decode_cutout_blocking, RawCutout, SurveyClient},
};
use tower::ServiceExt;

/// What the fake survey service answers with.
#[derive(Clone)]
pub enum FakeReply {
    Cutout,
    /// A different star field on every call.
    Varying,
    Body(&'static str),
    Fail(&'static str),
}

/// In-memory survey client that counts fetches.
pub struct FakeSkyView {
    calls: AtomicUsize,
    delay: Duration,
    reply: FakeReply,
    positions: std::sync::Mutex<Vec<String>>,
}

impl FakeSkyView {
    pub fn new(reply: FakeReply) -> Arc<Self> {
        Self::with_delay(reply, Duration::ZERO)
    }

    pub fn with_delay(reply: FakeReply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            reply,
            positions: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn positions(&self) -> Vec<String> {
        self.positions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SurveyClient for FakeSkyView {
    async fn fetch(&self, request: &CutoutRequest) -> SkyResult<RawCutout> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.positions
            .lock()
            .unwrap()
            .push(request.canonical_position());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.reply {
            FakeReply::Cutout => decode_cutout_blocking(Bytes::from(cutout_bytes())).await,
            FakeReply::Varying => {
                decode_cutout_blocking(Bytes::from(seeded_cutout_bytes(call as u32 + 100))).await
            }
            FakeReply::Body(body) => {
                decode_cutout_blocking(Bytes::from_static(body.as_bytes())).await
            }
            FakeReply::Fail(message) => Err(SkyError::UpstreamError(message.to_string())),
        }
    }
}

/// A small M51-like FITS cutout with a TAN WCS.
pub fn cutout_bytes() -> Vec<u8> {
    seeded_cutout_bytes(51)
}

pub fn seeded_cutout_bytes(seed: u32) -> Vec<u8> {
    let (ra, dec) = positions::M51;
    FitsFixture::new(48, 48)
        .with_data(star_field(48, 48, 3000.0, 50.0, seed))
        .tan_wcs(ra, dec, 0.4 / 48.0)
        .to_bytes()
}

pub fn test_config(cache_dir: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.cache.dir = cache_dir.to_path_buf();
    config.web.dir = cache_dir.join("web");
    config.web.aladin_dir = cache_dir.join("aladin");
    config.render.figure_size = 300;
    config
}

pub fn test_state(config: ServiceConfig, client: Arc<FakeSkyView>) -> Arc<AppState> {
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    Arc::new(AppState::with_client(config, client, prometheus).unwrap())
}

pub fn test_app(cache_dir: &Path, client: Arc<FakeSkyView>) -> Router {
    build_router(test_state(test_config(cache_dir), client))
}

pub async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_bytes(response: axum::response::Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
