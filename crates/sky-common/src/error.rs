//! Error types for the skyview tile services.

use thiserror::Error;

/// Result type alias using SkyError.
pub type SkyResult<T> = Result<T, SkyError>;

/// Primary error type for cutout operations.
#[derive(Debug, Error)]
pub enum SkyError {
    // === Client Errors ===
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Proxy target not allowed: {0}")]
    ProxyForbidden(String),

    #[error("Proxy endpoint is disabled")]
    ProxyDisabled,

    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    // === Upstream Errors ===
    #[error("Survey service returned no image: {0}")]
    UpstreamEmpty(String),

    #[error("Survey service request failed: {0}")]
    UpstreamError(String),

    // === Data Errors ===
    #[error("Image contains no data: {0}")]
    EmptyData(String),

    #[error("Invalid FITS data: {0}")]
    Fits(String),

    // === Rendering Errors ===
    #[error("Rendering failed: {0}")]
    Render(String),

    // === Storage Errors ===
    #[error("Cache store I/O failed: {0}")]
    StoreIo(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl SkyError {
    /// Convenience constructor for validation failures.
    pub fn invalid(message: impl Into<String>) -> Self {
        SkyError::InvalidQuery(message.into())
    }

    /// Stable machine-readable code for JSON error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            SkyError::InvalidQuery(_) => "InvalidQuery",
            SkyError::ProxyForbidden(_) => "ProxyForbidden",
            SkyError::ProxyDisabled => "ProxyDisabled",
            SkyError::MalformedUrl(_) => "MalformedUrl",
            SkyError::UpstreamEmpty(_) => "UpstreamEmpty",
            SkyError::UpstreamError(_) => "UpstreamError",
            SkyError::EmptyData(_) => "EmptyData",
            SkyError::Fits(_) => "FitsError",
            SkyError::Render(_) => "RenderFailed",
            SkyError::StoreIo(_) => "StoreIOError",
            SkyError::Internal(_) => "InternalError",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            SkyError::InvalidQuery(_) => 422,
            SkyError::ProxyForbidden(_) => 403,
            SkyError::ProxyDisabled => 404,
            SkyError::MalformedUrl(_) => 400,
            _ => 500,
        }
    }

    /// Whether the failure originated with the client rather than the service.
    pub fn is_client_error(&self) -> bool {
        self.http_status_code() < 500
    }
}

impl From<std::io::Error> for SkyError {
    fn from(err: std::io::Error) -> Self {
        SkyError::StoreIo(err.to_string())
    }
}

impl From<serde_json::Error> for SkyError {
    fn from(err: serde_json::Error) -> Self {
        SkyError::Internal(format!("JSON error: {}", err))
    }
}
