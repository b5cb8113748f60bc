//! Survey cutout fetching from NASA SkyView.

use async_trait::async_trait;
use bytes::Bytes;
use fits_parser::{looks_like_fits, FitsError, FitsImage};
use reqwest::Client;
use sky_common::{CutoutRequest, SkyError, SkyResult};
use tracing::{debug, info, instrument, warn};

use crate::config::UpstreamConfig;

const RUNQUERY_PATH: &str = "/current/cgi/runquery.pl";
const MAX_DIAGNOSTIC_LEN: usize = 300;

/// A fetched cutout: the bytes as served plus the decoded image.
#[derive(Debug, Clone)]
pub struct RawCutout {
    pub bytes: Bytes,
    pub image: FitsImage,
}

/// Source of raw survey cutouts.
#[async_trait]
pub trait SurveyClient: Send + Sync {
    async fn fetch(&self, request: &CutoutRequest) -> SkyResult<RawCutout>;
}

/// Client for the SkyView `runquery.pl` interface.
pub struct SkyViewClient {
    client: Client,
    endpoint: String,
}

impl SkyViewClient {
    pub fn new(config: &UpstreamConfig) -> SkyResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| SkyError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.base_url.trim_end_matches('/'), RUNQUERY_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Query parameters for one cutout.
pub fn query_params(request: &CutoutRequest) -> Vec<(&'static str, String)> {
    vec![
        ("Position", request.canonical_position()),
        ("Survey", request.survey().to_string()),
        ("Coordinates", "J2000".to_string()),
        (
            "Size",
            format!("{},{}", request.width_deg(), request.height_deg()),
        ),
        ("Pixels", request.pixels().to_string()),
        ("Projection", request.projection().to_string()),
        ("Return", "FITS".to_string()),
    ]
}

#[async_trait]
impl SurveyClient for SkyViewClient {
    #[instrument(skip(self, request), fields(position = %request.canonical_position(), survey = %request.survey()))]
    async fn fetch(&self, request: &CutoutRequest) -> SkyResult<RawCutout> {
        debug!(endpoint = %self.endpoint, "Requesting cutout");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query_params(request))
            .send()
            .await
            .map_err(|e| SkyError::UpstreamError(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SkyError::UpstreamError(format!(
                "SkyView returned HTTP {}",
                status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SkyError::UpstreamError(describe_transport_error(&e)))?;

        let cutout = decode_cutout_blocking(bytes).await?;
        info!(
            bytes = cutout.bytes.len(),
            width = cutout.image.width(),
            height = cutout.image.height(),
            "Fetched cutout"
        );
        Ok(cutout)
    }
}

/// Classify a 2xx response body.
///
/// SkyView answers with a short HTML page instead of FITS when a survey has
/// no coverage at the requested position.
pub fn decode_cutout(bytes: Bytes) -> SkyResult<RawCutout> {
    if !looks_like_fits(&bytes) {
        let diagnostic = diagnostic_text(&bytes);
        warn!(diagnostic = %diagnostic, "SkyView returned no FITS data");
        return Err(SkyError::UpstreamEmpty(diagnostic));
    }

    match FitsImage::from_bytes(&bytes) {
        Ok(image) => Ok(RawCutout { bytes, image }),
        Err(FitsError::NoImage(naxis)) => Err(SkyError::UpstreamEmpty(format!(
            "FITS response has no image plane (NAXIS={})",
            naxis
        ))),
        Err(e) => Err(SkyError::UpstreamError(format!(
            "Failed to parse FITS response: {}",
            e
        ))),
    }
}

/// [`decode_cutout`] on the blocking pool, keeping large planes off the
/// runtime workers.
pub async fn decode_cutout_blocking(bytes: Bytes) -> SkyResult<RawCutout> {
    tokio::task::spawn_blocking(move || decode_cutout(bytes))
        .await
        .map_err(|e| SkyError::Internal(format!("Decode task failed: {}", e)))?
}

/// Readable text from an HTML or plain-text body, truncated.
pub fn diagnostic_text(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => {
                in_tag = true;
                plain.push(' ');
            }
            '>' => in_tag = false,
            c if !in_tag => plain.push(c),
            _ => {}
        }
    }

    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "empty response".to_string();
    }
    match collapsed.char_indices().nth(MAX_DIAGNOSTIC_LEN) {
        Some((idx, _)) => format!("{}...", &collapsed[..idx]),
        None => collapsed,
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("SkyView request timed out: {}", e)
    } else if e.is_connect() {
        format!("Failed to connect to SkyView: {}", e)
    } else {
        format!("SkyView request failed: {}", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sky_common::PositionQuery;
    use test_utils::{FitsFixture, NO_DATA_BODY};

    fn request() -> CutoutRequest {
        CutoutRequest::builder(PositionQuery::coordinates(10.5, 41.2).unwrap())
            .width_deg(0.4)
            .pixels(600)
            .projection("Tan")
            .build()
            .unwrap()
    }

    #[test]
    fn test_query_params() {
        let params = query_params(&request());
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("Position"), "10.5 41.2");
        assert_eq!(get("Survey"), "DSS2 Red");
        assert_eq!(get("Coordinates"), "J2000");
        assert_eq!(get("Size"), "0.4,0.4");
        assert_eq!(get("Pixels"), "600");
        assert_eq!(get("Projection"), "Tan");
        assert_eq!(get("Return"), "FITS");
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let config = UpstreamConfig {
            base_url: "http://localhost:8081/".to_string(),
            ..UpstreamConfig::default()
        };
        let client = SkyViewClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8081/current/cgi/runquery.pl");
    }

    #[test]
    fn test_diagnostic_text_strips_markup() {
        assert_eq!(
            diagnostic_text(NO_DATA_BODY.as_bytes()),
            "No data No survey data available at this position."
        );
        assert_eq!(diagnostic_text(b"   "), "empty response");
        let long = "x".repeat(1000);
        assert_eq!(diagnostic_text(long.as_bytes()).len(), MAX_DIAGNOSTIC_LEN + 3);
    }

    #[test]
    fn test_decode_html_is_empty() {
        let err = decode_cutout(Bytes::from_static(NO_DATA_BODY.as_bytes())).unwrap_err();
        assert_eq!(err.error_code(), "UpstreamEmpty");
        assert!(err.to_string().contains("No survey data"));
    }

    #[test]
    fn test_decode_no_image_plane_is_empty() {
        let bytes = FitsFixture::new(4, 4).naxis(0).to_bytes();
        let err = decode_cutout(Bytes::from(bytes)).unwrap_err();
        assert_eq!(err.error_code(), "UpstreamEmpty");
    }

    #[test]
    fn test_decode_truncated_is_error() {
        let bytes = FitsFixture::new(64, 64).truncate(3000).to_bytes();
        let err = decode_cutout(Bytes::from(bytes)).unwrap_err();
        assert_eq!(err.error_code(), "UpstreamError");
    }

    #[test]
    fn test_decode_valid_fits() {
        let bytes = FitsFixture::new(8, 6).to_bytes();
        let cutout = decode_cutout(Bytes::from(bytes.clone())).unwrap();
        assert_eq!(cutout.bytes.as_ref(), bytes.as_slice());
        assert_eq!((cutout.image.width(), cutout.image.height()), (8, 6));
    }
}
