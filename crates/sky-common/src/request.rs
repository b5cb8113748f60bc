//! Validated cutout requests.
//!
//! Raw query strings arrive as [`TileQuery`] (every field optional text) and
//! are parsed exactly once into an immutable [`CutoutRequest`]. Anything
//! downstream of the parse can rely on the invariants below without
//! re-checking them.

use serde::{Deserialize, Serialize};

use crate::error::{SkyError, SkyResult};
use crate::position::PositionQuery;
use crate::slug::CacheKey;

/// Smallest accepted pixel count is exclusive.
pub const MIN_PIXELS_EXCLUSIVE: u32 = 32;
pub const MAX_PIXELS: u32 = 8192;

/// Defaults applied to `/tile` requests.
pub const DEFAULT_WIDTH_DEG: f64 = 60.0;
pub const DEFAULT_PIXELS: u32 = 1024;
pub const DEFAULT_SURVEY: &str = "DSS2 Red";
pub const DEFAULT_PROJECTION: &str = "Car";
pub const DEFAULT_OVERWRITE: bool = true;

/// Raw `/tile` query parameters as sent by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TileQuery {
    pub target: Option<String>,
    pub ra: Option<String>,
    pub dec: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub pixels: Option<String>,
    pub survey: Option<String>,
    pub projection: Option<String>,
    pub overwrite: Option<String>,
}

/// A fully validated cutout request. Fields are private so every instance
/// has passed through [`CutoutRequestBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutoutRequest {
    position: PositionQuery,
    survey: String,
    width_deg: f64,
    height_deg: f64,
    pixels: u32,
    projection: String,
    overwrite: bool,
}

impl CutoutRequest {
    pub fn builder(position: PositionQuery) -> CutoutRequestBuilder {
        CutoutRequestBuilder::new(position)
    }

    pub fn position(&self) -> &PositionQuery {
        &self.position
    }

    pub fn survey(&self) -> &str {
        &self.survey
    }

    pub fn width_deg(&self) -> f64 {
        self.width_deg
    }

    pub fn height_deg(&self) -> f64 {
        self.height_deg
    }

    pub fn pixels(&self) -> u32 {
        self.pixels
    }

    pub fn projection(&self) -> &str {
        &self.projection
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Position string handed to the survey service.
    pub fn canonical_position(&self) -> String {
        self.position.canonical()
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.position.canonical(), &self.survey)
    }
}

/// Builder that validates on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct CutoutRequestBuilder {
    position: PositionQuery,
    survey: String,
    width_deg: f64,
    height_deg: Option<f64>,
    pixels: u32,
    projection: String,
    overwrite: bool,
}

impl CutoutRequestBuilder {
    pub fn new(position: PositionQuery) -> Self {
        Self {
            position,
            survey: DEFAULT_SURVEY.to_string(),
            width_deg: DEFAULT_WIDTH_DEG,
            height_deg: None,
            pixels: DEFAULT_PIXELS,
            projection: DEFAULT_PROJECTION.to_string(),
            overwrite: DEFAULT_OVERWRITE,
        }
    }

    pub fn survey(mut self, survey: impl Into<String>) -> Self {
        self.survey = survey.into();
        self
    }

    pub fn width_deg(mut self, width: f64) -> Self {
        self.width_deg = width;
        self
    }

    /// Height in degrees; `None` means "same as width".
    pub fn height_deg(mut self, height: Option<f64>) -> Self {
        self.height_deg = height;
        self
    }

    pub fn pixels(mut self, pixels: u32) -> Self {
        self.pixels = pixels;
        self
    }

    pub fn projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = projection.into();
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn build(self) -> SkyResult<CutoutRequest> {
        let height_deg = self.height_deg.unwrap_or(self.width_deg);

        if !self.width_deg.is_finite() || self.width_deg <= 0.0 {
            return Err(SkyError::invalid(format!(
                "width must be a positive number of degrees, got {}",
                self.width_deg
            )));
        }
        if !height_deg.is_finite() || height_deg <= 0.0 {
            return Err(SkyError::invalid(format!(
                "height must be a positive number of degrees, got {}",
                height_deg
            )));
        }
        if self.pixels <= MIN_PIXELS_EXCLUSIVE || self.pixels > MAX_PIXELS {
            return Err(SkyError::invalid(format!(
                "pixels must be in ({}, {}], got {}",
                MIN_PIXELS_EXCLUSIVE, MAX_PIXELS, self.pixels
            )));
        }

        Ok(CutoutRequest {
            position: self.position,
            survey: self.survey,
            width_deg: self.width_deg,
            height_deg,
            pixels: self.pixels,
            projection: self.projection,
            overwrite: self.overwrite,
        })
    }
}

impl TryFrom<TileQuery> for CutoutRequest {
    type Error = SkyError;

    fn try_from(query: TileQuery) -> SkyResult<Self> {
        let ra = parse_float("ra", query.ra.as_deref())?;
        let dec = parse_float("dec", query.dec.as_deref())?;
        let position = PositionQuery::resolve(query.target.as_deref(), ra, dec)?;

        let mut builder = CutoutRequest::builder(position)
            .height_deg(parse_float("height", query.height.as_deref())?);

        if let Some(width) = parse_float("width", query.width.as_deref())? {
            builder = builder.width_deg(width);
        }
        if let Some(pixels) = non_blank(query.pixels.as_deref()) {
            let pixels = pixels
                .parse::<u32>()
                .map_err(|_| SkyError::invalid(format!("pixels must be an integer, got '{}'", pixels)))?;
            builder = builder.pixels(pixels);
        }
        if let Some(survey) = non_blank(query.survey.as_deref()) {
            builder = builder.survey(survey);
        }
        if let Some(projection) = non_blank(query.projection.as_deref()) {
            builder = builder.projection(projection);
        }
        if let Some(overwrite) = non_blank(query.overwrite.as_deref()) {
            builder = builder.overwrite(parse_bool("overwrite", overwrite)?);
        }

        builder.build()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_float(name: &str, value: Option<&str>) -> SkyResult<Option<f64>> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| SkyError::invalid(format!("{} must be a number, got '{}'", name, raw))),
    }
}

fn parse_bool(name: &str, raw: &str) -> SkyResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SkyError::invalid(format!("{} must be a boolean, got '{}'", name, raw))),
    }
}
