//! Allow-listed pass-through for front-end resources.
//!
//! Only `http`/`https` URLs whose host is on the configured allow-list are
//! fetched. The upstream status and content type are relayed as-is and the
//! body is capped at `max_bytes`.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::{header, Client, StatusCode, Url};
use sky_common::{SkyError, SkyResult};
use tracing::{debug, instrument};

use crate::config::ProxyConfig;

/// A relayed upstream response.
#[derive(Debug)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

pub struct ProxyClient {
    client: Client,
    allow_hosts: Vec<String>,
    max_bytes: usize,
}

impl ProxyClient {
    pub fn new(config: &ProxyConfig) -> SkyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SkyError::Internal(format!("Failed to create proxy client: {}", e)))?;

        Ok(Self {
            client,
            allow_hosts: config
                .allow_hosts
                .iter()
                .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            max_bytes: config.max_bytes,
        })
    }

    /// Parse `target` and check it against the allow-list.
    pub fn check_target(&self, target: &str) -> SkyResult<Url> {
        let url = Url::parse(target.trim())
            .map_err(|e| SkyError::MalformedUrl(format!("{}: {}", target, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(SkyError::ProxyForbidden(format!(
                "scheme '{}' is not allowed",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| SkyError::MalformedUrl(format!("{}: missing host", target)))?
            .to_ascii_lowercase();

        if !self.host_allowed(&host) {
            return Err(SkyError::ProxyForbidden(host));
        }
        Ok(url)
    }

    fn host_allowed(&self, host: &str) -> bool {
        self.allow_hosts.iter().any(|allowed| {
            host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .map_or(false, |prefix| prefix.ends_with('.'))
        })
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn relay(&self, url: Url) -> SkyResult<ProxiedResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SkyError::UpstreamError(format!("Proxy request failed: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(self.too_large());
            }
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| SkyError::UpstreamError(format!("Proxy read failed: {}", e)))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(status = %status, bytes = body.len(), "Relayed proxy response");
        Ok(ProxiedResponse {
            status,
            content_type,
            body: body.freeze(),
        })
    }

    fn too_large(&self) -> SkyError {
        SkyError::UpstreamError(format!(
            "Proxied response exceeds {} bytes",
            self.max_bytes
        ))
    }
}
